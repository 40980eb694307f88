use crate::terrain::quadtree::TerrainSettings;
use noise::{NoiseFn, Perlin};

/// Normalized heights for one quadtree tile
#[derive(Debug, Clone)]
pub struct Heightmap {
    pub lod: u32,
    pub tile_x: u32,
    pub tile_z: u32,
    pub resolution: u32,
    /// Row-major, z then x, each in 0..1
    pub heights: Vec<f32>,
}

impl Heightmap {
    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.heights)
    }

    pub fn sample(&self, x: u32, z: u32) -> f32 {
        self.heights[(z * self.resolution + x) as usize]
    }
}

pub struct HeightmapGenerator {
    height_noise: Perlin,
    detail_noise: Perlin,
}

impl HeightmapGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            height_noise: Perlin::new(seed),
            detail_noise: Perlin::new(seed.wrapping_add(1)),
        }
    }

    /// Height in 0..1 at a world position
    pub fn height(&self, world_x: f64, world_z: f64) -> f32 {
        // Large rolling hills plus smaller bumps
        let broad = self.height_noise.get([world_x * 0.02, world_z * 0.02]);
        let medium = self.detail_noise.get([world_x * 0.06, world_z * 0.06]) * 0.35;
        let fine = self.height_noise.get([world_x * 0.2, world_z * 0.2]) * 0.08;
        let combined = (broad + medium + fine) / 1.43;
        ((combined * 0.5 + 0.5) as f32).clamp(0.0, 1.0)
    }

    /// Sample the tile's footprint so neighbouring tiles share edge heights
    pub fn generate_tile(&self, settings: &TerrainSettings, lod: u32, tile_x: u32, tile_z: u32) -> Heightmap {
        let resolution = settings.heightmap_resolution.max(2);
        let tiles_per_side = 1u32 << lod;
        let tile_size = settings.world_size as f64 / tiles_per_side as f64;
        let min_x = -(settings.world_size as f64) * 0.5 + tile_x as f64 * tile_size;
        let min_z = -(settings.world_size as f64) * 0.5 + tile_z as f64 * tile_size;
        let step = tile_size / (resolution - 1) as f64;

        let mut heights = Vec::with_capacity((resolution * resolution) as usize);
        for z in 0..resolution {
            for x in 0..resolution {
                heights.push(self.height(min_x + x as f64 * step, min_z + z as f64 * step));
            }
        }
        Heightmap {
            lod,
            tile_x,
            tile_z,
            resolution,
            heights,
        }
    }

    /// Every tile of every level: LOD 0, then LOD 1 and LOD 2, each row-major
    pub fn generate_all(&self, settings: &TerrainSettings) -> Vec<Heightmap> {
        let mut maps = Vec::with_capacity(21);
        for lod in 0..=2 {
            let side = 1u32 << lod;
            for tile_z in 0..side {
                for tile_x in 0..side {
                    maps.push(self.generate_tile(settings, lod, tile_x, tile_z));
                }
            }
        }
        log::info!(
            "[HeightmapGenerator::generate_all] Generated {} heightmaps at {}x{}",
            maps.len(),
            settings.heightmap_resolution,
            settings.heightmap_resolution
        );
        maps
    }
}
