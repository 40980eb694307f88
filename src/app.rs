//! Window, event loop and the per-frame driver for the demo

use crate::config::EngineConfig;
use crate::demo;
use crate::error::{EngineError, ErrorContext};
use crate::gpu::GpuBackend;
use crate::input::InputState;
use crate::renderer::{FrameContext, FrameScheduler, UiOverlay, WgpuBackend};
use anyhow::Result;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, ElementState, Event, WindowEvent};
use winit::event_loop::{EventLoop, EventLoopWindowTarget};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowBuilder};

/// Rolling frame-rate estimate for the overlay
struct FpsCounter {
    frames: u32,
    elapsed: f32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            frames: 0,
            elapsed: 0.0,
            fps: 0.0,
        }
    }

    fn tick(&mut self, delta: f32) -> f32 {
        self.frames += 1;
        self.elapsed += delta;
        if self.elapsed >= 0.5 {
            self.fps = self.frames as f32 / self.elapsed;
            self.frames = 0;
            self.elapsed = 0.0;
        }
        self.fps
    }
}

struct App {
    config: EngineConfig,
    window: Arc<Window>,
    backend: WgpuBackend,
    scheduler: FrameScheduler,
    ctx: FrameContext,
    overlay: UiOverlay,
    input: InputState,
    fps: FpsCounter,
    last_frame: Instant,
}

impl App {
    fn redraw(&mut self) -> Result<(), EngineError> {
        let now = Instant::now();
        let delta = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        self.ctx.time.advance(delta);
        self.input
            .apply_fly_camera(&mut self.ctx.camera, &self.config.camera, delta);
        demo::animate(&mut self.ctx);

        let fps = self.fps.tick(delta);
        let ui = self.overlay.run(&self.window, &mut self.ctx, fps);
        self.backend.set_ui_frame(ui);
        self.scheduler.render_frame(&mut self.ctx, &mut self.backend)?;

        let rendered = self.scheduler.frames_rendered();
        if rendered > 0 && rendered % 600 == 0 {
            let p = self.ctx.camera.position;
            log::info!(
                "[App::redraw] Frame {} ({:.0} fps), fence {}, camera ({:.1}, {:.1}, {:.1})",
                rendered,
                fps,
                self.scheduler.fence(),
                p.x,
                p.y,
                p.z
            );
        }
        Ok(())
    }

    fn handle_window_event(&mut self, event: WindowEvent, elwt: &EventLoopWindowTarget<()>) -> Result<(), EngineError> {
        let consumed = self.overlay.on_window_event(&self.window, &event);
        match event {
            WindowEvent::CloseRequested => {
                log::info!("[App] Close requested");
                self.scheduler.shutdown(&mut self.backend)?;
                elwt.exit();
            }
            WindowEvent::Resized(size) => {
                self.scheduler
                    .resize(&mut self.ctx, &mut self.backend, size.width, size.height)?;
            }
            WindowEvent::Focused(false) => self.input.release_all(),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(code) = event.physical_key {
                    if event.state == ElementState::Pressed && !event.repeat {
                        match code {
                            KeyCode::Escape => {
                                self.scheduler.shutdown(&mut self.backend)?;
                                elwt.exit();
                            }
                            KeyCode::F1 => self.overlay.toggle(),
                            _ => {}
                        }
                    }
                    if !consumed || event.state == ElementState::Released {
                        self.input.process_key(code, event.state);
                    }
                }
            }
            WindowEvent::MouseInput { button, state, .. } => {
                if !consumed || state == ElementState::Released {
                    self.input.process_mouse_button(button, state);
                }
            }
            WindowEvent::RedrawRequested => self.redraw()?,
            _ => {}
        }
        Ok(())
    }
}

pub async fn run(config: EngineConfig) -> Result<()> {
    log::info!("[app::run] Creating window...");
    let event_loop = EventLoop::new().engine_context("event_loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&config.window.title)
            .with_inner_size(LogicalSize::new(config.window.width, config.window.height))
            .build(&event_loop)
            .map_err(|e| {
                log::error!("[app::run] Window creation failed: {}", e);
                e
            })
            .engine_context("window")?,
    );

    let mut backend = WgpuBackend::new(Arc::clone(&window), config.window.vsync).await?;
    log::info!("[app::run] Rendering on '{}'", backend.adapter_name());
    let (width, height) = backend.surface_size();
    let (assets, ctx) = demo::build_scene(&config, width, height)?;
    let scheduler = FrameScheduler::new(&mut backend, &assets, &ctx, config.shadows.map_size)?;
    let overlay = UiOverlay::new(&window);

    let mut app = App {
        config,
        window,
        backend,
        scheduler,
        ctx,
        overlay,
        input: InputState::new(),
        fps: FpsCounter::new(),
        last_frame: Instant::now(),
    };

    let failure: Rc<RefCell<Option<EngineError>>> = Rc::new(RefCell::new(None));
    let loop_failure = Rc::clone(&failure);
    event_loop.run(move |event, elwt| {
        let result = match event {
            Event::WindowEvent { event, window_id } if window_id == app.window.id() => {
                app.handle_window_event(event, elwt)
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => {
                app.input.process_mouse_motion(delta);
                Ok(())
            }
            Event::AboutToWait => {
                app.window.request_redraw();
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = result {
            log::error!("[app::run] Fatal error: {}", err);
            loop_failure.borrow_mut().get_or_insert(err);
            elwt.exit();
        }
    })?;

    let result = failure.borrow_mut().take();
    match result {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}
