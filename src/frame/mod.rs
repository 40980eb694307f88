//! Per-frame resources and the ring that recycles them.

pub mod constants;
pub mod frame_resource;
pub mod ring;

pub use constants::{
    LightConstants, MaterialConstants, ObjectConstants, PassConstants, PostConstants,
    ShadowConstants, TaaConstants,
};
pub use frame_resource::{FrameCapacity, FrameResource};
pub use ring::FrameRing;

/// Frames the CPU may record ahead of GPU completion
pub const FRAME_RESOURCE_COUNT: usize = 3;
