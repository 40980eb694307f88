//! Tone mapping, chromatic aberration and color grading into the back buffer

use super::PassRecorder;
use crate::error::EngineResult;
use crate::gpu::{Command, ConstantBuffer, LutKind, PipelineKind, ResourceState, ViewKey};
use crate::renderer::context::Tunables;

pub fn record(recorder: &mut PassRecorder<'_>, tunables: &Tunables) -> EngineResult<()> {
    let (source_view, source) = if recorder.targets.history_valid() {
        let read = recorder.targets.history_read();
        (ViewKey::TaaHistory(read as u8), recorder.targets.history[read])
    } else {
        (ViewKey::SceneColor, recorder.targets.scene_color)
    };
    let lut = if tunables.color_correction {
        LutKind::Effect
    } else {
        LutKind::Neutral
    };
    let back_buffer = recorder.targets.back_buffer;

    recorder.transition(source, ResourceState::PixelShaderRead)?;
    recorder.transition(back_buffer, ResourceState::RenderTarget)?;
    recorder.set_targets(vec![back_buffer], None);
    recorder.set_pipeline(PipelineKind::Post);
    recorder.bind_constants(0, ConstantBuffer::Post, 0);
    recorder.bind_views(1, vec![source_view, ViewKey::Lut(lut)]);
    recorder.record(Command::DrawFullscreen);
    Ok(())
}
