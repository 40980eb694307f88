//! UI composite onto the back buffer and the hand-off to present

use super::PassRecorder;
use crate::error::EngineResult;
use crate::gpu::{Command, ResourceState};

/// Overlay on top of the finished image, then hand the back buffer to present
pub fn record(recorder: &mut PassRecorder<'_>) -> EngineResult<()> {
    let back_buffer = recorder.targets.back_buffer;
    recorder.record(Command::DrawUi);
    recorder.transition(back_buffer, ResourceState::Present)?;
    Ok(())
}
