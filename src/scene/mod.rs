//! Scene data: meshes, textures, materials, render items and lights.
//!
//! Everything is interned when the scene is built so the per-frame passes
//! only deal in small copyable ids.

pub mod light;
pub mod material;
pub mod mesh;
pub mod render_item;
pub mod shapes;

pub use light::{Light, LightKind, LightSet, ShadowSlot};
pub use material::{Material, MaterialId, MaterialLibrary, TextureData, TextureId, TextureLibrary};
pub use mesh::{MeshData, MeshId, MeshLibrary, ShapeData, Submesh, Vertex};
pub use render_item::{compose_world, Batch, RenderItem, RenderItemRegistry};
