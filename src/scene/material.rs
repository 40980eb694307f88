//! Textures and materials, interned at load time

use crate::error::{EngineError, EngineResult};
use crate::frame::{MaterialConstants, FRAME_RESOURCE_COUNT};
use crate::gpu::UploadBuffer;
use glam::{Mat4, Vec3, Vec4};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

impl TextureId {
    /// 1x1 white texture that always exists
    pub const PLACEHOLDER: TextureId = TextureId(0);
}

/// Tightly packed RGBA8 pixels
#[derive(Debug, Clone)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn checker(name: impl Into<String>, size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = (size / cells.max(1)).max(1);
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let even = ((x / cell) + (y / cell)) % 2 == 0;
                rgba.extend_from_slice(if even { &a } else { &b });
            }
        }
        Self {
            name: name.into(),
            width: size,
            height: size,
            rgba,
        }
    }
}

#[derive(Debug)]
pub struct TextureLibrary {
    textures: Vec<TextureData>,
    by_name: HashMap<String, TextureId>,
}

impl Default for TextureLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureLibrary {
    pub const PLACEHOLDER_NAME: &'static str = "placeholder_white";

    pub fn new() -> Self {
        let placeholder = TextureData {
            name: Self::PLACEHOLDER_NAME.to_string(),
            width: 1,
            height: 1,
            rgba: vec![255; 4],
        };
        let mut by_name = HashMap::new();
        by_name.insert(placeholder.name.clone(), TextureId::PLACEHOLDER);
        Self {
            textures: vec![placeholder],
            by_name,
        }
    }

    pub fn add(&mut self, texture: TextureData) -> EngineResult<TextureId> {
        let expected = (texture.width * texture.height * 4) as usize;
        if texture.width == 0 || texture.height == 0 || texture.rgba.len() != expected {
            return Err(EngineError::Internal {
                component: "texture_library".to_string(),
                message: format!(
                    "texture '{}' is {}x{} but has {} bytes",
                    texture.name,
                    texture.width,
                    texture.height,
                    texture.rgba.len()
                ),
            });
        }
        if self.by_name.contains_key(&texture.name) {
            return Err(EngineError::Internal {
                component: "texture_library".to_string(),
                message: format!("texture '{}' already loaded", texture.name),
            });
        }
        let id = TextureId(self.textures.len() as u32);
        log::debug!(
            "[TextureLibrary::add] '{}' -> {:?} ({}x{})",
            texture.name,
            id,
            texture.width,
            texture.height
        );
        self.by_name.insert(texture.name.clone(), id);
        self.textures.push(texture);
        Ok(id)
    }

    pub fn id(&self, name: &str) -> EngineResult<TextureId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::AssetNotFound {
                kind: "texture",
                name: name.to_string(),
            })
    }

    pub fn resolve_or_placeholder(&self, name: &str) -> TextureId {
        match self.id(name) {
            Ok(id) => id,
            Err(_) => {
                log::warn!(
                    "[TextureLibrary::resolve_or_placeholder] Texture '{}' not found, using placeholder",
                    name
                );
                TextureId::PLACEHOLDER
            }
        }
    }

    pub fn get(&self, id: TextureId) -> Option<&TextureData> {
        self.textures.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TextureId, &TextureData)> {
        self.textures
            .iter()
            .enumerate()
            .map(|(i, t)| (TextureId(i as u32), t))
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    /// Element in the per-frame material buffer
    pub cb_index: u32,
    pub diffuse: TextureId,
    pub diffuse_albedo: Vec4,
    pub fresnel_r0: Vec3,
    pub roughness: f32,
    pub mat_transform: Mat4,
    /// Frame resources still holding stale constants
    pub dirty: usize,
}

impl Material {
    pub fn new(name: impl Into<String>, diffuse: TextureId) -> Self {
        Self {
            name: name.into(),
            cb_index: 0,
            diffuse,
            diffuse_albedo: Vec4::ONE,
            fresnel_r0: Vec3::splat(0.02),
            roughness: 0.5,
            mat_transform: Mat4::IDENTITY,
            dirty: FRAME_RESOURCE_COUNT,
        }
    }

    pub fn with_albedo(mut self, albedo: Vec4) -> Self {
        self.diffuse_albedo = albedo;
        self
    }

    pub fn with_surface(mut self, fresnel_r0: Vec3, roughness: f32) -> Self {
        self.fresnel_r0 = fresnel_r0;
        self.roughness = roughness;
        self
    }

    pub fn constants(&self) -> MaterialConstants {
        MaterialConstants {
            diffuse_albedo: self.diffuse_albedo.to_array(),
            fresnel_r0: self.fresnel_r0.to_array(),
            roughness: self.roughness,
            mat_transform: self.mat_transform.to_cols_array_2d(),
        }
    }
}

#[derive(Debug, Default)]
pub struct MaterialLibrary {
    materials: Vec<Material>,
    by_name: HashMap<String, MaterialId>,
}

impl MaterialLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materials whose texture is unknown to `textures` fall back to the placeholder
    pub fn add(&mut self, mut material: Material, textures: &TextureLibrary) -> MaterialId {
        if textures.get(material.diffuse).is_none() {
            log::warn!(
                "[MaterialLibrary::add] Material '{}' references missing texture {:?}, using placeholder",
                material.name,
                material.diffuse
            );
            material.diffuse = TextureId::PLACEHOLDER;
        }
        let id = MaterialId(self.materials.len() as u32);
        material.cb_index = id.0;
        material.dirty = FRAME_RESOURCE_COUNT;
        self.by_name.insert(material.name.clone(), id);
        self.materials.push(material);
        id
    }

    pub fn id(&self, name: &str) -> EngineResult<MaterialId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::AssetNotFound {
                kind: "material",
                name: name.to_string(),
            })
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    /// Edits through this handle must be followed by `mark_dirty`
    pub fn get_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0 as usize)
    }

    pub fn mark_dirty(&mut self, id: MaterialId) {
        if let Some(material) = self.materials.get_mut(id.0 as usize) {
            material.dirty = FRAME_RESOURCE_COUNT;
        }
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }

    pub fn update_material_constants(&mut self, buffer: &mut UploadBuffer<MaterialConstants>) -> EngineResult<usize> {
        let mut written = 0;
        for material in self.materials.iter_mut().filter(|m| m.dirty > 0) {
            buffer.copy_data(material.cb_index as usize, &material.constants())?;
            material.dirty -= 1;
            written += 1;
        }
        Ok(written)
    }
}
