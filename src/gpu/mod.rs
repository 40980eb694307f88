//! Backend-neutral GPU layer
//!
//! Resource state tracking, typed views, recorded command lists and the
//! traits a concrete backend implements.

pub mod backend;
pub mod command;
pub mod descriptors;
pub mod health;
pub mod recording;
pub mod resource;
pub mod upload;

pub use backend::{ConstantLayout, FenceTimeline, GpuBackend};
pub use command::{Command, CommandList, ConstantBuffer, DrawKind, DrawRecord, PipelineKind};
pub use descriptors::{DescriptorTable, GBufferTarget, LutKind, ViewKey};
pub use health::{DeviceHealth, DeviceHealthMonitor};
pub use recording::{RecordingBackend, SimulatedTimeline, Submission};
pub use resource::{
    transition, Resource, ResourceDesc, ResourceId, ResourceKind, ResourcePool, ResourceState,
    TextureFormat,
};
pub use upload::{aligned_stride, UploadBuffer, CONSTANT_ALIGNMENT};
