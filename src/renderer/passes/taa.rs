//! Temporal resolve into the ping-pong history

use super::PassRecorder;
use crate::error::EngineResult;
use crate::gpu::{Command, ConstantBuffer, GBufferTarget, PipelineKind, ResourceState, ViewKey};

pub fn record(recorder: &mut PassRecorder<'_>) -> EngineResult<()> {
    let read = recorder.targets.history_read();
    let write = recorder.targets.history_write();
    let depth = recorder.targets.depth;
    let depth_write = recorder.targets.depth_history[write];
    let history_write = recorder.targets.history[write];
    let history_read = recorder.targets.history[read];
    let scene_color = recorder.targets.scene_color;

    // Keep this frame's depth for next frame's disocclusion test
    recorder.transition(depth, ResourceState::CopySource)?;
    recorder.transition(depth_write, ResourceState::CopyDest)?;
    recorder.record(Command::CopyTexture {
        src: depth,
        dst: depth_write,
    });

    recorder.transition(depth_write, ResourceState::PixelShaderRead)?;
    recorder.transition(depth, ResourceState::PixelShaderRead)?;
    recorder.transition(scene_color, ResourceState::PixelShaderRead)?;
    recorder.transition(history_read, ResourceState::PixelShaderRead)?;
    recorder.transition(history_write, ResourceState::RenderTarget)?;

    recorder.set_targets(vec![history_write], None);
    recorder.set_pipeline(PipelineKind::Taa);
    recorder.bind_constants(0, ConstantBuffer::Taa, 0);
    recorder.bind_views(
        1,
        vec![
            ViewKey::SceneColor,
            ViewKey::TaaHistory(read as u8),
            ViewKey::Depth,
            ViewKey::DepthHistory(read as u8),
            ViewKey::GBuffer(GBufferTarget::Velocity),
        ],
    );
    recorder.record(Command::DrawFullscreen);
    recorder.transition(history_write, ResourceState::PixelShaderRead)?;

    recorder.targets.swap_history();
    recorder.transition(depth, ResourceState::DepthWrite)?;
    Ok(())
}
