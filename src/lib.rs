//! Strata: a real-time deferred renderer
//!
//! A fixed frame graph (shadow, G-buffer, lighting, TAA, post, UI) recorded
//! against a backend-neutral command list, with explicit resource-state
//! tracking, a triple-buffered frame ring and a quadtree terrain LOD.

pub mod app;
pub mod camera;
pub mod config;
pub mod demo;
pub mod error;
pub mod frame;
pub mod gpu;
pub mod input;
pub mod renderer;
pub mod scene;
pub mod terrain;

pub use camera::{Camera, CameraSettings};
pub use config::{EngineConfig, DEFAULT_CONFIG_FILE};
pub use error::{EngineError, EngineResult};
pub use frame::{FrameRing, FRAME_RESOURCE_COUNT};
pub use gpu::{GpuBackend, RecordingBackend};
pub use renderer::{FrameContext, FrameOutcome, FrameScheduler, Tunables, WgpuBackend};
