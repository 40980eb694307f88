//! Fixed-depth terrain quadtree and per-frame LOD selection
//!
//! Level 0 is one tile covering the whole terrain, level 1 is 2x2 and
//! level 2 is 4x4. Refinement is decided on each node's own box, so a
//! coarse tile may be kept even when some of its children would be close.

use crate::terrain::frustum::{Aabb, Frustum};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

pub const MAX_LOD: u32 = 2;

/// Nodes in the complete tree: 1 + 4 + 16
pub const NODE_COUNT: usize = 21;

/// Upper bound on tiles a single selection can return
pub const MAX_VISIBLE_TILES: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainSettings {
    pub world_size: f32,
    pub height_scale: f32,
    pub origin_y: f32,
    /// Below this distance the root is split into LOD 1 tiles
    pub max_dist_lod1: f32,
    /// Below this distance an LOD 1 tile is split into LOD 2 tiles
    pub max_dist_lod2: f32,
    /// Heightmap edge length in texels for every tile
    pub heightmap_resolution: u32,
    /// Grid cells per side of the shared tile mesh
    pub tile_grid_cells: u32,
    pub enabled: bool,
}

impl Default for TerrainSettings {
    fn default() -> Self {
        Self {
            world_size: 100.0,
            height_scale: 50.0,
            origin_y: 0.0,
            max_dist_lod1: 60.0,
            max_dist_lod2: 30.0,
            heightmap_resolution: 65,
            tile_grid_cells: 32,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TerrainNode {
    pub bounds: Aabb,
    pub lod: u32,
    pub tile_x: u32,
    pub tile_z: u32,
    pub height_index: Option<u32>,
    pub children: Option<Box<[TerrainNode; 4]>>,
}

impl TerrainNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    fn build(bounds: Aabb, lod: u32, tile_x: u32, tile_z: u32) -> Self {
        let children = (lod < MAX_LOD).then(|| {
            let quarter = bounds.extents.x * 0.5;
            Box::new(std::array::from_fn(|i| {
                let cx = (i % 2) as u32;
                let cz = (i / 2) as u32;
                let ox = if cx == 0 { -quarter } else { quarter };
                let oz = if cz == 0 { -quarter } else { quarter };
                let child_bounds = Aabb::from_center_extents(
                    bounds.center + Vec3::new(ox, 0.0, oz),
                    Vec3::new(quarter, bounds.extents.y, quarter),
                );
                TerrainNode::build(child_bounds, lod + 1, tile_x * 2 + cx, tile_z * 2 + cz)
            }))
        });
        Self {
            bounds,
            lod,
            tile_x,
            tile_z,
            height_index: None,
            children,
        }
    }

    pub fn children(&self) -> &[TerrainNode] {
        match &self.children {
            Some(children) => children.as_slice(),
            None => &[],
        }
    }

    /// Depth-first visit of this node and its subtree
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a TerrainNode)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    fn assign_heights(&mut self, lod0: &[u32], lod1: &[u32], lod2: &[u32]) {
        let (table, side) = match self.lod {
            0 => (lod0, 1),
            1 => (lod1, 2),
            _ => (lod2, 4),
        };
        if self.tile_x < side && self.tile_z < side {
            let idx = (self.tile_z * side + self.tile_x) as usize;
            self.height_index = table.get(idx).copied();
        }
        if let Some(children) = self.children.as_mut() {
            for child in children.iter_mut() {
                child.assign_heights(lod0, lod1, lod2);
            }
        }
    }
}

/// One selected tile, rebuilt every frame
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainTile {
    pub lod: u32,
    pub tile_x: u32,
    pub tile_z: u32,
    pub world: Mat4,
    pub aabb: Aabb,
    pub height_index: Option<u32>,
}

pub struct Terrain {
    settings: TerrainSettings,
    root: TerrainNode,
    visible: Vec<TerrainTile>,
}

impl Terrain {
    pub fn build_quadtree(settings: TerrainSettings) -> Self {
        let half_height = settings.height_scale * 0.5;
        let half_size = settings.world_size * 0.5;
        let root_bounds = Aabb::from_center_extents(
            Vec3::new(0.0, settings.origin_y + half_height, 0.0),
            Vec3::new(half_size, half_height, half_size),
        );
        let root = TerrainNode::build(root_bounds, 0, 0, 0);
        log::info!(
            "[Terrain::build_quadtree] Built {} nodes over {}x{} units",
            NODE_COUNT,
            settings.world_size,
            settings.world_size
        );
        Self {
            settings,
            root,
            visible: Vec::with_capacity(MAX_VISIBLE_TILES),
        }
    }

    pub fn settings(&self) -> &TerrainSettings {
        &self.settings
    }

    pub fn set_lod_distances(&mut self, max_dist_lod1: f32, max_dist_lod2: f32) {
        self.settings.max_dist_lod1 = max_dist_lod1;
        self.settings.max_dist_lod2 = max_dist_lod2;
    }

    pub fn root(&self) -> &TerrainNode {
        &self.root
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.root.visit(&mut |_| count += 1);
        count
    }

    /// Heightmap lookups: one entry for LOD 0, 2x2 for LOD 1, 4x4 for LOD 2,
    /// each row-major by tile z then x.
    pub fn assign_height_indices(&mut self, lod0: &[u32], lod1: &[u32], lod2: &[u32]) {
        self.root.assign_heights(lod0, lod1, lod2);
    }

    pub fn select_visible_tiles(
        &mut self,
        view_proj: Mat4,
        eye: Vec3,
        max_dist_lod1: f32,
        max_dist_lod2: f32,
    ) -> &[TerrainTile] {
        self.visible.clear();
        let frustum = Frustum::from_view_projection(view_proj);
        let height_scale = self.settings.height_scale;
        select_node(
            &self.root,
            &frustum,
            eye,
            max_dist_lod1,
            max_dist_lod2,
            height_scale,
            &mut self.visible,
        );
        log::trace!(
            "[Terrain::select_visible_tiles] {} tiles visible",
            self.visible.len()
        );
        &self.visible
    }

    /// Select with the configured LOD distances
    pub fn update(&mut self, view_proj: Mat4, eye: Vec3) -> &[TerrainTile] {
        let (lod1, lod2) = (self.settings.max_dist_lod1, self.settings.max_dist_lod2);
        self.select_visible_tiles(view_proj, eye, lod1, lod2)
    }

    pub fn visible_tiles(&self) -> &[TerrainTile] {
        &self.visible
    }
}

fn tile_from_node(node: &TerrainNode, height_scale: f32) -> TerrainTile {
    let half = node.bounds.extents.x;
    let world = Mat4::from_translation(node.bounds.center)
        * Mat4::from_scale(Vec3::new(half * 2.0, height_scale, half * 2.0));
    TerrainTile {
        lod: node.lod,
        tile_x: node.tile_x,
        tile_z: node.tile_z,
        world,
        aabb: node.bounds,
        height_index: node.height_index,
    }
}

fn select_node(
    node: &TerrainNode,
    frustum: &Frustum,
    eye: Vec3,
    max_dist_lod1: f32,
    max_dist_lod2: f32,
    height_scale: f32,
    out: &mut Vec<TerrainTile>,
) {
    if !frustum.intersects_aabb(&node.bounds) {
        return;
    }
    if node.is_leaf() || node.lod == MAX_LOD {
        out.push(tile_from_node(node, height_scale));
        return;
    }

    let distance = eye.distance(node.bounds.center);
    let refine = (node.lod == 0 && distance < max_dist_lod1)
        || (node.lod == 1 && distance < max_dist_lod2);
    if refine {
        for child in node.children() {
            select_node(child, frustum, eye, max_dist_lod1, max_dist_lod2, height_scale, out);
        }
    } else {
        out.push(tile_from_node(node, height_scale));
    }
}
