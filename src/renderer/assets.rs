//! Static scene data pushed to the GPU once at startup

use crate::error::EngineResult;
use crate::gpu::{GpuBackend, ResourceDesc, ResourceId, ResourceKind, ResourcePool, ResourceState, TextureFormat, ViewKey};
use crate::scene::{MeshLibrary, TextureId, TextureLibrary};
use crate::terrain::Heightmap;
use std::collections::BTreeMap;

/// CPU-side assets the scene was built from
#[derive(Default)]
pub struct SceneAssets {
    pub meshes: MeshLibrary,
    pub textures: TextureLibrary,
    /// Indexed by terrain height index
    pub heightmaps: Vec<Heightmap>,
}

/// GPU resources backing the scene's textures and heightmaps
#[derive(Debug, Default)]
pub struct GpuAssets {
    textures: BTreeMap<TextureId, ResourceId>,
    heightmaps: Vec<ResourceId>,
}

impl GpuAssets {
    pub fn upload(
        assets: &SceneAssets,
        pool: &mut ResourcePool,
        backend: &mut dyn GpuBackend,
    ) -> EngineResult<Self> {
        for (id, mesh) in assets.meshes.iter() {
            backend.create_mesh(id, &mesh.vertices, &mesh.indices)?;
        }

        let mut textures = BTreeMap::new();
        for (id, texture) in assets.textures.iter() {
            let desc = ResourceDesc::texture_2d(
                texture.name.clone(),
                ResourceKind::Texture,
                TextureFormat::Rgba8UnormSrgb,
                texture.width,
                texture.height,
            );
            let resource = pool.create(desc, ResourceState::PixelShaderRead);
            let desc = pool.desc(resource)?;
            backend.create_resource(resource, desc)?;
            backend.upload_texture(resource, desc, &texture.rgba)?;
            textures.insert(id, resource);
        }

        let mut heightmaps = Vec::with_capacity(assets.heightmaps.len());
        for (index, map) in assets.heightmaps.iter().enumerate() {
            let desc = ResourceDesc::texture_2d(
                format!("heightmap_{}", index),
                ResourceKind::Texture,
                TextureFormat::R32Float,
                map.resolution,
                map.resolution,
            );
            let resource = pool.create(desc, ResourceState::PixelShaderRead);
            let desc = pool.desc(resource)?;
            backend.create_resource(resource, desc)?;
            backend.upload_texture(resource, desc, map.bytes())?;
            heightmaps.push(resource);
        }

        log::info!(
            "[GpuAssets::upload] {} meshes, {} textures, {} heightmaps",
            assets.meshes.len(),
            textures.len(),
            heightmaps.len()
        );
        Ok(Self { textures, heightmaps })
    }

    pub fn texture(&self, id: TextureId) -> Option<ResourceId> {
        self.textures.get(&id).copied()
    }

    pub fn heightmap_count(&self) -> usize {
        self.heightmaps.len()
    }

    pub fn view_entries(&self) -> Vec<(ViewKey, ResourceId)> {
        let textures = self
            .textures
            .iter()
            .map(|(&id, &resource)| (ViewKey::Texture(id), resource));
        let heightmaps = self
            .heightmaps
            .iter()
            .enumerate()
            .map(|(i, &resource)| (ViewKey::Heightmap(i as u32), resource));
        textures.chain(heightmaps).collect()
    }
}
