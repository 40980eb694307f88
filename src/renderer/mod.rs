//! Deferred frame graph: targets, passes and the per-frame scheduler
//!
//! `FrameScheduler` drives one frame through shadow, geometry, lighting,
//! TAA, post and UI against any `GpuBackend`. `WgpuBackend` is the on-screen
//! implementation; tests use the recording backend instead.

pub mod assets;
pub mod context;
pub mod passes;
pub mod scheduler;
pub mod targets;
pub mod ui_overlay;
pub mod wgpu_backend;

pub use assets::{GpuAssets, SceneAssets};
pub use context::{FrameContext, FrameTime, TerrainLayer, Tunables};
pub use scheduler::{FrameOutcome, FrameScheduler};
pub use targets::{RenderTargets, LUT_SIZE};
pub use ui_overlay::{UiFrame, UiOverlay};
pub use wgpu_backend::WgpuBackend;
