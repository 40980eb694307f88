//! CPU-writable state owned by one in-flight frame slot.

use crate::error::EngineResult;
use crate::frame::constants::{
    LightConstants, MaterialConstants, ObjectConstants, PassConstants, PostConstants,
    ShadowConstants, TaaConstants,
};
use crate::gpu::{CommandList, ConstantBuffer, ConstantLayout, GpuBackend, UploadBuffer};

/// Element counts fixed when the ring is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCapacity {
    /// Render items plus the largest possible set of terrain tiles
    pub objects: usize,
    pub materials: usize,
    pub lights: usize,
}

pub struct FrameResource {
    slot: usize,
    pub commands: CommandList,
    pub objects: UploadBuffer<ObjectConstants>,
    pub materials: UploadBuffer<MaterialConstants>,
    pub lights: UploadBuffer<LightConstants>,
    pub shadows: UploadBuffer<ShadowConstants>,
    pub pass: UploadBuffer<PassConstants>,
    pub taa: UploadBuffer<TaaConstants>,
    pub post: UploadBuffer<PostConstants>,
}

fn layout_of<T: bytemuck::Pod>(buffer: ConstantBuffer, upload: &UploadBuffer<T>) -> ConstantLayout {
    ConstantLayout {
        buffer,
        stride: upload.stride(),
        element_size: upload.element_size(),
        capacity: upload.capacity(),
    }
}

impl FrameResource {
    pub fn new(slot: usize, capacity: FrameCapacity) -> Self {
        log::debug!(
            "[FrameResource::new] Slot {}: {} objects, {} materials, {} lights",
            slot,
            capacity.objects,
            capacity.materials,
            capacity.lights
        );
        Self {
            slot,
            commands: CommandList::new(slot),
            objects: UploadBuffer::new("object", capacity.objects),
            materials: UploadBuffer::new("material", capacity.materials),
            lights: UploadBuffer::new("light", capacity.lights),
            shadows: UploadBuffer::new("shadow_transform", capacity.lights),
            pass: UploadBuffer::new("pass", 1),
            taa: UploadBuffer::new("taa", 1),
            post: UploadBuffer::new("post", 1),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn layouts(&self) -> Vec<ConstantLayout> {
        vec![
            layout_of(ConstantBuffer::Pass, &self.pass),
            layout_of(ConstantBuffer::Object, &self.objects),
            layout_of(ConstantBuffer::Material, &self.materials),
            layout_of(ConstantBuffer::Light, &self.lights),
            layout_of(ConstantBuffer::ShadowTransform, &self.shadows),
            layout_of(ConstantBuffer::Taa, &self.taa),
            layout_of(ConstantBuffer::Post, &self.post),
        ]
    }

    /// Push every dirty range to the backend; returns bytes written
    pub fn upload(&mut self, backend: &mut dyn GpuBackend) -> EngineResult<usize> {
        let slot = self.slot;
        let mut written = 0;
        let mut push = |buffer: ConstantBuffer, dirty: Option<(u64, &[u8])>| -> EngineResult<()> {
            if let Some((offset, bytes)) = dirty {
                backend.write_constants(slot, buffer, offset, bytes)?;
                written += bytes.len();
            }
            Ok(())
        };
        push(ConstantBuffer::Pass, self.pass.take_dirty())?;
        push(ConstantBuffer::Object, self.objects.take_dirty())?;
        push(ConstantBuffer::Material, self.materials.take_dirty())?;
        push(ConstantBuffer::Light, self.lights.take_dirty())?;
        push(ConstantBuffer::ShadowTransform, self.shadows.take_dirty())?;
        push(ConstantBuffer::Taa, self.taa.take_dirty())?;
        push(ConstantBuffer::Post, self.post.take_dirty())?;
        log::trace!("[FrameResource::upload] Slot {} uploaded {} bytes", slot, written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::RecordingBackend;

    #[test]
    fn test_upload_only_sends_dirty_ranges() {
        let mut backend = RecordingBackend::new(8, 8);
        let mut frame = FrameResource::new(
            1,
            FrameCapacity {
                objects: 4,
                materials: 2,
                lights: 2,
            },
        );
        backend.create_constant_buffers(1, &frame.layouts()).unwrap();
        assert_eq!(frame.upload(&mut backend).unwrap(), 0);

        let mut post: PostConstants = bytemuck::Zeroable::zeroed();
        post.chromatic_aberration_offset = 0.25;
        frame.post.copy_data(0, &post).unwrap();
        assert_eq!(frame.upload(&mut backend).unwrap(), 256);

        let bytes = backend.constant_bytes(1, ConstantBuffer::Post).unwrap();
        let uploaded: PostConstants = bytemuck::pod_read_unaligned(&bytes[..16]);
        assert_eq!(uploaded.chromatic_aberration_offset, 0.25);
    }
}
