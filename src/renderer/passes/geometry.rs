//! G-buffer fill for render items and terrain tiles

use super::PassRecorder;
use crate::error::EngineResult;
use crate::gpu::{Command, ConstantBuffer, GBufferTarget, PipelineKind, ResourceState, ViewKey};
use crate::renderer::context::TerrainLayer;
use crate::scene::{MaterialLibrary, RenderItemRegistry};

pub fn record(
    recorder: &mut PassRecorder<'_>,
    items: &RenderItemRegistry,
    materials: &MaterialLibrary,
    terrain: Option<&TerrainLayer>,
    tile_object_base: u32,
) -> EngineResult<()> {
    let gbuffer = recorder.targets.gbuffer;
    let depth = recorder.targets.depth;

    for &target in &gbuffer {
        recorder.transition(target, ResourceState::RenderTarget)?;
    }
    recorder.transition(depth, ResourceState::DepthWrite)?;
    for &target in &gbuffer {
        recorder.record(Command::ClearColor {
            target,
            color: [0.0; 4],
        });
    }
    recorder.record(Command::ClearDepth { target: depth, depth: 1.0 });
    recorder.set_targets(gbuffer.to_vec(), Some(depth));

    recorder.set_pipeline(PipelineKind::Geometry);
    recorder.bind_constants(0, ConstantBuffer::Pass, 0);
    for batch in items.batches() {
        let Some(material) = materials.get(batch.material) else {
            log::warn!("[geometry::record] Unknown material {:?}, batch skipped", batch.material);
            continue;
        };
        recorder.bind_constants(2, ConstantBuffer::Material, material.cb_index);
        recorder.bind_views(3, vec![ViewKey::Texture(material.diffuse)]);
        for index in batch.items {
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

    if let Some(layer) = terrain {
        record_terrain(recorder, layer, materials, tile_object_base);
    }

    for &target in &gbuffer {
        recorder.transition(target, ResourceState::PixelShaderRead)?;
    }
    Ok(())
}

fn record_terrain(recorder: &mut PassRecorder<'_>, layer: &TerrainLayer, materials: &MaterialLibrary, tile_object_base: u32) {
    let tiles = layer.terrain.visible_tiles();
    if tiles.is_empty() {
        return;
    }
    let Some(material) = materials.get(layer.material) else {
        log::warn!("[geometry::record_terrain] Unknown terrain material {:?}", layer.material);
        return;
    };

    recorder.set_pipeline(PipelineKind::TerrainGeometry);
    recorder.bind_constants(0, ConstantBuffer::Pass, 0);
    recorder.bind_constants(2, ConstantBuffer::Material, material.cb_index);
    for (i, tile) in tiles.iter().enumerate() {
        let Some(height_index) = tile.height_index else {
            log::debug!(
                "[geometry::record_terrain] Tile lod {} ({}, {}) has no heightmap",
                tile.lod,
                tile.tile_x,
                tile.tile_z
            );
            continue;
        };
        recorder.bind_constants(1, ConstantBuffer::Object, tile_object_base + i as u32);
        recorder.bind_views(3, vec![ViewKey::Heightmap(height_index), ViewKey::Texture(material.diffuse)]);
        recorder.record(Command::DrawIndexed {
            mesh: layer.mesh,
            index_count: layer.grid.index_count,
            first_index: layer.grid.first_index,
            base_vertex: layer.grid.base_vertex,
        });
    }
}

/// Velocity is read by TAA only; the other targets feed lighting
pub const LIGHTING_INPUTS: [GBufferTarget; 3] = [GBufferTarget::Albedo, GBufferTarget::Normal, GBufferTarget::Position];
