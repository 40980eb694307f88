//! Heightmap terrain with quadtree level-of-detail selection.

pub mod frustum;
pub mod heightmap;
pub mod quadtree;

pub use frustum::{Aabb, Frustum, Plane};
pub use heightmap::{Heightmap, HeightmapGenerator};
pub use quadtree::{
    Terrain, TerrainNode, TerrainSettings, TerrainTile, MAX_LOD, MAX_VISIBLE_TILES, NODE_COUNT,
};
