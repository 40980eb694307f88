//! egui debug overlay editing the live frame context
//!
//! The overlay owns the egui context and winit integration. Each frame it
//! produces a `UiFrame` that the wgpu backend composites at `DrawUi`.

use crate::renderer::context::{FrameContext, Tunables};
use crate::scene::{Light, LightKind, RenderItem};
use egui::ViewportId;
use winit::event::WindowEvent;
use winit::window::Window;

/// Tessellated overlay ready for upload
pub struct UiFrame {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

pub struct UiOverlay {
    context: egui::Context,
    state: egui_winit::State,
    visible: bool,
}

impl UiOverlay {
    pub fn new(window: &Window) -> Self {
        let context = egui::Context::default();
        let state = egui_winit::State::new(context.clone(), ViewportId::ROOT, window, None, None);
        Self {
            context,
            state,
            visible: true,
        }
    }

    /// Returns true when egui consumed the event
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        log::info!("[UiOverlay::toggle] Overlay {}", if self.visible { "shown" } else { "hidden" });
    }

    pub fn wants_pointer(&self) -> bool {
        self.context.wants_pointer_input()
    }

    pub fn wants_keyboard(&self) -> bool {
        self.context.wants_keyboard_input()
    }

    /// Run the panels against `ctx` and tessellate the result
    pub fn run(&mut self, window: &Window, ctx: &mut FrameContext, fps: f32) -> UiFrame {
        let input = self.state.take_egui_input(window);
        let visible = self.visible;
        let output = self.context.run(input, |egui_ctx| {
            if visible {
                stats_panel(egui_ctx, ctx, fps);
                objects_panel(egui_ctx, ctx.items.items_mut());
                lights_panel(egui_ctx, ctx.lights.lights_mut());
                tunables_panel(egui_ctx, &mut ctx.tunables);
            }
        });
        self.state.handle_platform_output(window, output.platform_output);
        let primitives = self.context.tessellate(output.shapes, output.pixels_per_point);
        UiFrame {
            primitives,
            textures_delta: output.textures_delta,
            pixels_per_point: output.pixels_per_point,
        }
    }
}

fn stats_panel(egui_ctx: &egui::Context, ctx: &FrameContext, fps: f32) {
    egui::Window::new("Stats")
        .default_pos([10.0, 10.0])
        .show(egui_ctx, |ui| {
            ui.label(format!("{:.0} fps", fps));
            ui.label(format!("{} items, {} lights", ctx.items.len(), ctx.lights.len()));
            if let Some(layer) = &ctx.terrain {
                ui.label(format!("{} terrain tiles", layer.terrain.visible_tiles().len()));
            }
            let p = ctx.camera.position;
            ui.label(format!("camera ({:.1}, {:.1}, {:.1})", p.x, p.y, p.z));
        });
}

fn vec3_row(ui: &mut egui::Ui, label: &str, value: &mut glam::Vec3, speed: f64) -> bool {
    ui.horizontal(|ui| {
        ui.label(label);
        let x = ui.add(egui::DragValue::new(&mut value.x).speed(speed)).changed();
        let y = ui.add(egui::DragValue::new(&mut value.y).speed(speed)).changed();
        let z = ui.add(egui::DragValue::new(&mut value.z).speed(speed)).changed();
        x || y || z
    })
    .inner
}

fn objects_panel(egui_ctx: &egui::Context, items: &mut [RenderItem]) {
    egui::Window::new("Objects")
        .default_open(false)
        .show(egui_ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                for (i, item) in items.iter_mut().enumerate() {
                    egui::CollapsingHeader::new(&item.name)
                        .id_source(("item", i))
                        .show(ui, |ui| {
                            let mut changed = vec3_row(ui, "position", &mut item.position, 0.1);
                            changed |= vec3_row(ui, "rotation", &mut item.rotation, 0.01);
                            changed |= vec3_row(ui, "scale", &mut item.scale, 0.01);
                            if changed {
                                item.sync_transform();
                            }
                        });
                }
            });
        });
}

fn lights_panel(egui_ctx: &egui::Context, lights: &mut [Light]) {
    egui::Window::new("Lights")
        .default_open(false)
        .show(egui_ctx, |ui| {
            for (i, light) in lights.iter_mut().enumerate() {
                let title = format!("{} ({})", light.name, light.kind().label());
                egui::CollapsingHeader::new(title)
                    .id_source(("light", i))
                    .show(ui, |ui| {
                        let mut color = light.color.to_array();
                        ui.horizontal(|ui| {
                            ui.label("color");
                            ui.color_edit_button_rgb(&mut color);
                        });
                        light.color = glam::Vec3::from_array(color);
                        ui.add(egui::Slider::new(&mut light.strength, 0.0..=10.0).text("strength"));

                        match light.kind() {
                            LightKind::Ambient => {}
                            LightKind::Point => {
                                vec3_row(ui, "position", &mut light.position, 0.1);
                                ui.add(egui::Slider::new(&mut light.falloff_start, 0.0..=50.0).text("falloff start"));
                                ui.add(egui::Slider::new(&mut light.falloff_end, 0.0..=100.0).text("falloff end"));
                            }
                            LightKind::Directional => {
                                if vec3_row(ui, "direction", &mut light.direction, 0.01) {
                                    light.direction = light.direction.try_normalize().unwrap_or(glam::Vec3::NEG_Y);
                                }
                            }
                            LightKind::Spot => {
                                vec3_row(ui, "position", &mut light.position, 0.1);
                                vec3_row(ui, "rotation", &mut light.rotation, 1.0);
                                ui.add(egui::Slider::new(&mut light.falloff_end, 0.0..=200.0).text("falloff end"));
                                ui.add(egui::Slider::new(&mut light.spot_power, 1.0..=256.0).text("spot power"));
                            }
                        }

                        if light.kind().uses_shadow_map() {
                            ui.add_enabled(
                                light.shadow().is_some(),
                                egui::Checkbox::new(&mut light.casts_shadows, "casts shadows"),
                            );
                            ui.checkbox(&mut light.pcf_enabled, "PCF");
                            ui.add(egui::Slider::new(&mut light.pcf_level, 0..=3).text("PCF level"));
                        }
                    });
            }
        });
}

fn tunables_panel(egui_ctx: &egui::Context, tunables: &mut Tunables) {
    egui::Window::new("Post Process")
        .default_open(false)
        .show(egui_ctx, |ui| {
            ui.add(
                egui::Slider::new(&mut tunables.chromatic_aberration_offset, 0.0..=0.02)
                    .text("chromatic aberration"),
            );
            ui.checkbox(&mut tunables.color_correction, "color correction");
        });
    egui::Window::new("TAA")
        .default_open(false)
        .show(egui_ctx, |ui| {
            ui.checkbox(&mut tunables.taa_enabled, "enabled");
            ui.add(egui::Slider::new(&mut tunables.taa_strength, 0.0..=1.0).text("strength"));
            ui.add(egui::Slider::new(&mut tunables.taa_alpha, 0.01..=1.0).text("alpha"));
            ui.add(egui::Slider::new(&mut tunables.taa_clamp_expand, 0.0..=0.5).text("clamp expand"));
            if ui.button("Reset").clicked() {
                let defaults = Tunables::default();
                tunables.taa_strength = defaults.taa_strength;
                tunables.taa_alpha = defaults.taa_alpha;
                tunables.taa_clamp_expand = defaults.taa_clamp_expand;
            }
        });
}
