//! Everything a frame reads from the application, passed in explicitly

use crate::camera::Camera;
use crate::scene::{LightSet, MaterialId, MaterialLibrary, MeshId, RenderItemRegistry, Submesh};
use crate::terrain::Terrain;
use serde::{Deserialize, Serialize};

/// Parameters the UI overlay edits at runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tunables {
    pub chromatic_aberration_offset: f32,
    pub color_correction: bool,
    pub taa_enabled: bool,
    pub taa_strength: f32,
    /// Weight of the current frame in the history blend
    pub taa_alpha: f32,
    pub taa_clamp_expand: f32,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            chromatic_aberration_offset: 0.0,
            color_correction: true,
            taa_enabled: true,
            taa_strength: 1.0,
            taa_alpha: 0.1,
            taa_clamp_expand: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    pub total: f32,
    pub delta: f32,
}

impl FrameTime {
    pub fn advance(&mut self, delta: f32) {
        self.delta = delta;
        self.total += delta;
    }
}

/// Terrain quadtree plus what the geometry pass needs to draw its tiles
pub struct TerrainLayer {
    pub terrain: Terrain,
    pub mesh: MeshId,
    pub grid: Submesh,
    pub material: MaterialId,
}

pub struct FrameContext {
    pub camera: Camera,
    pub tunables: Tunables,
    pub items: RenderItemRegistry,
    pub lights: LightSet,
    pub materials: MaterialLibrary,
    pub terrain: Option<TerrainLayer>,
    pub time: FrameTime,
}

impl FrameContext {
    /// Object buffer elements needed for items and the largest tile selection
    pub fn object_capacity(&self) -> usize {
        let tiles = if self.terrain.is_some() {
            crate::terrain::MAX_VISIBLE_TILES
        } else {
            0
        };
        self.items.len() + tiles
    }
}
