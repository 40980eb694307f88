//! Depth-only rendering from every shadow-casting light

use super::PassRecorder;
use crate::error::EngineResult;
use crate::gpu::{Command, ConstantBuffer, PipelineKind, ResourceState};
use crate::scene::{LightSet, RenderItemRegistry};

pub fn record(recorder: &mut PassRecorder<'_>, lights: &LightSet, items: &RenderItemRegistry) -> EngineResult<usize> {
    let batches = items.batches();
    let mut rendered = 0;

    for (light, slot) in lights.shadow_casters() {
        let Some(map) = recorder.targets.shadow_map(slot.0) else {
            log::warn!(
                "[shadow::record] Light '{}' has slot {} but no shadow map exists",
                light.name,
                slot.0
            );
            continue;
        };

        recorder.transition(map, ResourceState::DepthWrite)?;
        recorder.record(Command::ClearDepth { target: map, depth: 1.0 });
        recorder.set_targets(Vec::new(), Some(map));
        recorder.set_pipeline(PipelineKind::Shadow);
        recorder.bind_constants(0, ConstantBuffer::ShadowTransform, light.cb_index);

        for batch in &batches {
            for &index in &batch.items {
                let item = &items.items()[index];
                recorder.bind_constants(1, ConstantBuffer::Object, item.object_index);
                recorder.record(Command::DrawIndexed {
                    mesh: item.mesh,
                    index_count: item.submesh.index_count,
                    first_index: item.submesh.first_index,
                    base_vertex: item.submesh.base_vertex,
                });
            }
        }

        recorder.transition(map, ResourceState::PixelShaderRead)?;
        rendered += 1;
    }
    Ok(rendered)
}
