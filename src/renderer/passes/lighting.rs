//! Additive deferred lighting, one full-screen draw per light

use super::geometry::LIGHTING_INPUTS;
use super::PassRecorder;
use crate::error::EngineResult;
use crate::gpu::{Command, ConstantBuffer, PipelineKind, ResourceState, ViewKey};
use crate::scene::{Light, LightSet};

fn shadow_view(light: &Light) -> ViewKey {
    match light.shadow() {
        Some(slot) if light.casts_shadows => ViewKey::ShadowMap(slot.0),
        _ => ViewKey::NullShadow,
    }
}

pub fn record(recorder: &mut PassRecorder<'_>, lights: &LightSet) -> EngineResult<()> {
    let scene_color = recorder.targets.scene_color;
    recorder.transition(scene_color, ResourceState::RenderTarget)?;
    recorder.record(Command::ClearColor {
        target: scene_color,
        color: [0.0, 0.0, 0.0, 1.0],
    });
    recorder.set_targets(vec![scene_color], None);
    recorder.set_pipeline(PipelineKind::Lighting);
    recorder.bind_constants(0, ConstantBuffer::Pass, 0);

    for light in lights.lights() {
        let mut views: Vec<ViewKey> = LIGHTING_INPUTS.iter().map(|&t| ViewKey::GBuffer(t)).collect();
        views.push(shadow_view(light));
        recorder.bind_constants(1, ConstantBuffer::Light, light.cb_index);
        recorder.bind_views(2, views);
        recorder.record(Command::DrawFullscreen);
    }
    Ok(())
}
