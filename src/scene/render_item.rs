//! Render items and the registry that feeds the shadow and geometry passes

use crate::error::EngineResult;
use crate::frame::{ObjectConstants, FRAME_RESOURCE_COUNT};
use crate::gpu::UploadBuffer;
use crate::scene::material::MaterialId;
use crate::scene::mesh::{MeshId, Submesh};
use glam::{EulerRot, Mat4, Quat, Vec3};

#[derive(Debug, Clone)]
pub struct RenderItem {
    pub name: String,
    pub position: Vec3,
    /// Euler angles in radians, applied yaw, pitch then roll
    pub rotation: Vec3,
    pub scale: Vec3,
    pub world: Mat4,
    pub prev_world: Mat4,
    pub tex_transform: Mat4,
    pub material: MaterialId,
    pub mesh: MeshId,
    pub submesh: Submesh,
    /// Element in the per-frame object buffer
    pub object_index: u32,
    /// Frame resources still holding stale constants
    pub dirty: usize,
}

pub fn compose_world(position: Vec3, rotation: Vec3, scale: Vec3) -> Mat4 {
    let rotation = Quat::from_euler(EulerRot::YXZ, rotation.y, rotation.x, rotation.z);
    Mat4::from_scale_rotation_translation(scale, rotation, position)
}

impl RenderItem {
    pub fn new(name: impl Into<String>, mesh: MeshId, submesh: Submesh, material: MaterialId) -> Self {
        Self {
            name: name.into(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            world: Mat4::IDENTITY,
            prev_world: Mat4::IDENTITY,
            tex_transform: Mat4::IDENTITY,
            material,
            mesh,
            submesh,
            object_index: 0,
            dirty: FRAME_RESOURCE_COUNT,
        }
    }

    /// Initial placement; the item starts at rest
    pub fn with_transform(mut self, position: Vec3, rotation: Vec3, scale: Vec3) -> Self {
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
        self.world = compose_world(position, rotation, scale);
        self.prev_world = self.world;
        self
    }

    pub fn with_tex_transform(mut self, tex_transform: Mat4) -> Self {
        self.tex_transform = tex_transform;
        self
    }

    pub fn set_transform(&mut self, position: Vec3, rotation: Vec3, scale: Vec3) {
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
        self.world = compose_world(position, rotation, scale);
        self.dirty = FRAME_RESOURCE_COUNT;
    }

    /// Re-derive `world` after `position`, `rotation` or `scale` were edited in place
    pub fn sync_transform(&mut self) {
        let world = compose_world(self.position, self.rotation, self.scale);
        if world != self.world {
            self.world = world;
            self.dirty = FRAME_RESOURCE_COUNT;
        }
    }

    pub fn constants(&self) -> ObjectConstants {
        ObjectConstants::new(self.world, self.prev_world, self.tex_transform)
    }
}

/// Items sharing one mesh and material, in registry order
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub mesh: MeshId,
    pub material: MaterialId,
    pub items: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct RenderItemRegistry {
    items: Vec<RenderItem>,
}

impl RenderItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut item: RenderItem) -> u32 {
        let index = self.items.len() as u32;
        item.object_index = index;
        item.dirty = FRAME_RESOURCE_COUNT;
        log::debug!("[RenderItemRegistry::add] '{}' -> object {}", item.name, index);
        self.items.push(item);
        index
    }

    pub fn items(&self) -> &[RenderItem] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [RenderItem] {
        &mut self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn batches(&self) -> Vec<Batch> {
        let mut batches: Vec<Batch> = Vec::new();
        for (index, item) in self.items.iter().enumerate() {
            match batches
                .iter_mut()
                .find(|b| b.mesh == item.mesh && b.material == item.material)
            {
                Some(batch) => batch.items.push(index),
                None => batches.push(Batch {
                    mesh: item.mesh,
                    material: item.material,
                    items: vec![index],
                }),
            }
        }
        batches
    }

    pub fn update_object_constants(&mut self, buffer: &mut UploadBuffer<ObjectConstants>) -> EngineResult<usize> {
        let mut written = 0;
        for item in self.items.iter_mut().filter(|i| i.dirty > 0) {
            buffer.copy_data(item.object_index as usize, &item.constants())?;
            item.dirty -= 1;
            written += 1;
        }
        Ok(written)
    }

    /// Roll `prev_world` forward for items that moved this frame. The roll
    /// itself changes their constants, so they are marked dirty again until
    /// every slot has seen the item at rest.
    pub fn end_frame(&mut self) {
        for item in self.items.iter_mut().filter(|i| i.prev_world != i.world) {
            item.prev_world = item.world;
            item.dirty = FRAME_RESOURCE_COUNT;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::Aabb;

    fn submesh() -> Submesh {
        Submesh {
            index_count: 36,
            first_index: 0,
            base_vertex: 0,
            bounds: Aabb::from_center_extents(Vec3::ZERO, Vec3::splat(0.5)),
        }
    }

    #[test]
    fn test_world_composes_scale_rotation_translation() {
        let world = compose_world(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            Vec3::splat(2.0),
        );
        let p = world.transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 2.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn test_batches_group_in_insertion_order() {
        let mut registry = RenderItemRegistry::new();
        registry.add(RenderItem::new("a", MeshId(0), submesh(), MaterialId(1)));
        registry.add(RenderItem::new("b", MeshId(1), submesh(), MaterialId(0)));
        registry.add(RenderItem::new("c", MeshId(0), submesh(), MaterialId(1)));
        let batches = registry.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].items, vec![0, 2]);
        assert_eq!(batches[1].mesh, MeshId(1));
        assert_eq!(registry.items()[2].object_index, 2);
    }

    #[test]
    fn test_moved_item_reaches_every_slot() {
        let mut registry = RenderItemRegistry::new();
        registry.add(RenderItem::new("box", MeshId(0), submesh(), MaterialId(0)));
        let mut slots: Vec<UploadBuffer<ObjectConstants>> = (0..FRAME_RESOURCE_COUNT)
            .map(|_| UploadBuffer::new("object", 1))
            .collect();
        for (frame, slot) in (0..FRAME_RESOURCE_COUNT).zip(slots.iter_mut()) {
            registry.update_object_constants(slot).unwrap();
            registry.end_frame();
            assert_eq!(registry.items()[0].dirty, FRAME_RESOURCE_COUNT - frame - 1);
        }

        registry.items_mut()[0].set_transform(Vec3::new(4.0, 0.0, 0.0), Vec3::ZERO, Vec3::ONE);
        let target = registry.items()[0].world;

        let mut frame = 0;
        while registry.items()[0].dirty > 0 {
            let slot = &mut slots[frame % FRAME_RESOURCE_COUNT];
            registry.update_object_constants(slot).unwrap();
            registry.end_frame();
            frame += 1;
            assert!(frame <= 2 * FRAME_RESOURCE_COUNT);
        }
        // One frame carries the motion, then each slot receives the rest state
        assert_eq!(frame, FRAME_RESOURCE_COUNT + 1);
        for slot in &slots {
            let constants = slot.read(0).unwrap();
            assert_eq!(constants.world(), target);
            assert_eq!(Mat4::from_cols_array_2d(&constants.prev_world), target);
        }
    }

    #[test]
    fn test_sync_transform_only_dirties_on_change() {
        let mut item = RenderItem::new("box", MeshId(0), submesh(), MaterialId(0));
        item.dirty = 0;
        item.sync_transform();
        assert_eq!(item.dirty, 0);
        item.scale = Vec3::splat(3.0);
        item.sync_transform();
        assert_eq!(item.dirty, FRAME_RESOURCE_COUNT);
    }
}
