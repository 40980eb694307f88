//! The seam between recorded frames and a concrete GPU API.

use crate::error::EngineResult;
use crate::gpu::command::{CommandList, ConstantBuffer};
use crate::gpu::descriptors::DescriptorTable;
use crate::gpu::health::DeviceHealth;
use crate::gpu::resource::{ResourceDesc, ResourceId};
use crate::scene::{MeshId, Vertex};

/// Monotonic GPU completion marker
pub trait FenceTimeline: Send + Sync {
    /// Highest fence value the GPU has finished
    fn completed_value(&self) -> u64;

    /// Block the calling thread until `completed_value() >= value`
    fn wait_for(&self, value: u64);
}

/// Shape of one per-frame constant buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantLayout {
    pub buffer: ConstantBuffer,
    /// Distance between elements, a multiple of the dynamic offset alignment
    pub stride: usize,
    /// Bytes the shader sees per element
    pub element_size: usize,
    pub capacity: usize,
}

impl ConstantLayout {
    pub fn byte_len(&self) -> usize {
        self.stride * self.capacity
    }
}

pub trait GpuBackend {
    fn name(&self) -> &str;

    fn timeline(&self) -> &dyn FenceTimeline;

    /// Current presentable surface size
    fn surface_size(&self) -> (u32, u32);

    /// Create or replace the GPU object behind `id`
    fn create_resource(&mut self, id: ResourceId, desc: &ResourceDesc) -> EngineResult<()>;

    fn destroy_resource(&mut self, id: ResourceId);

    /// Fill a whole texture; `bytes` is tightly packed
    fn upload_texture(&mut self, id: ResourceId, desc: &ResourceDesc, bytes: &[u8]) -> EngineResult<()>;

    fn create_mesh(&mut self, mesh: MeshId, vertices: &[Vertex], indices: &[u32]) -> EngineResult<()>;

    fn create_constant_buffers(&mut self, frame_slot: usize, layouts: &[ConstantLayout]) -> EngineResult<()>;

    fn write_constants(
        &mut self,
        frame_slot: usize,
        buffer: ConstantBuffer,
        offset: u64,
        bytes: &[u8],
    ) -> EngineResult<()>;

    /// Only called after a full flush
    fn rebuild_descriptor_table(&mut self, table: &DescriptorTable) -> EngineResult<()>;

    /// Acquire the back buffer. `Ok(false)` means skip this frame.
    fn begin_frame(&mut self) -> EngineResult<bool>;

    /// Execute `list` and signal `fence` once the GPU has finished it
    fn submit(&mut self, list: &CommandList, fence: u64) -> EngineResult<()>;

    fn present(&mut self) -> EngineResult<()>;

    fn resize(&mut self, width: u32, height: u32) -> EngineResult<()>;

    /// Wait for every submission up to `last_fence`
    fn flush(&mut self, last_fence: u64) -> EngineResult<()> {
        self.timeline().wait_for(last_fence);
        Ok(())
    }

    fn check_device_health(&self) -> DeviceHealth;
}
