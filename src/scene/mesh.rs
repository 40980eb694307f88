//! Interned mesh storage

use crate::error::{EngineError, EngineResult};
use crate::terrain::Aabb;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::collections::HashMap;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(pub u32);

/// Index range of one drawable part inside a mesh's shared buffers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Submesh {
    pub index_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub bounds: Aabb,
}

/// Loose vertices and indices for a single shape
#[derive(Debug, Clone, Default)]
pub struct ShapeData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl ShapeData {
    pub fn bounds(&self) -> Aabb {
        let mut min = Vec3::splat(f32::MAX);
        let mut max = Vec3::splat(f32::MIN);
        for v in &self.vertices {
            let p = Vec3::from(v.position);
            min = min.min(p);
            max = max.max(p);
        }
        if self.vertices.is_empty() {
            return Aabb::from_center_extents(Vec3::ZERO, Vec3::ZERO);
        }
        Aabb::from_min_max(min, max)
    }
}

#[derive(Debug, Clone)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<(String, Submesh)>,
}

impl MeshData {
    /// Concatenate shapes into one buffer pair, one submesh per part
    pub fn from_parts(name: impl Into<String>, parts: Vec<(String, ShapeData)>) -> Self {
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        let mut submeshes = Vec::with_capacity(parts.len());
        for (part_name, shape) in parts {
            let submesh = Submesh {
                index_count: shape.indices.len() as u32,
                first_index: indices.len() as u32,
                base_vertex: vertices.len() as i32,
                bounds: shape.bounds(),
            };
            vertices.extend_from_slice(&shape.vertices);
            indices.extend_from_slice(&shape.indices);
            submeshes.push((part_name, submesh));
        }
        Self {
            name: name.into(),
            vertices,
            indices,
            submeshes,
        }
    }
}

#[derive(Debug, Default)]
pub struct MeshLibrary {
    meshes: Vec<MeshData>,
    by_name: HashMap<String, MeshId>,
}

impl MeshLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mesh: MeshData) -> MeshId {
        if let Some(&id) = self.by_name.get(&mesh.name) {
            log::warn!("[MeshLibrary::add] Replacing mesh '{}'", mesh.name);
            self.meshes[id.0 as usize] = mesh;
            return id;
        }
        let id = MeshId(self.meshes.len() as u32);
        log::debug!(
            "[MeshLibrary::add] '{}' -> {:?} ({} vertices, {} indices)",
            mesh.name,
            id,
            mesh.vertices.len(),
            mesh.indices.len()
        );
        self.by_name.insert(mesh.name.clone(), id);
        self.meshes.push(mesh);
        id
    }

    pub fn id(&self, name: &str) -> EngineResult<MeshId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| EngineError::AssetNotFound {
                kind: "mesh",
                name: name.to_string(),
            })
    }

    pub fn get(&self, id: MeshId) -> Option<&MeshData> {
        self.meshes.get(id.0 as usize)
    }

    pub fn submesh(&self, id: MeshId, name: &str) -> EngineResult<Submesh> {
        let mesh = self.get(id).ok_or_else(|| EngineError::AssetNotFound {
            kind: "mesh",
            name: format!("{:?}", id),
        })?;
        mesh.submeshes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| *s)
            .ok_or_else(|| EngineError::AssetNotFound {
                kind: "submesh",
                name: format!("{}/{}", mesh.name, name),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (MeshId, &MeshData)> {
        self.meshes
            .iter()
            .enumerate()
            .map(|(i, m)| (MeshId(i as u32), m))
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
