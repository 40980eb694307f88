//! Engine-wide error type
//!
//! Fatal GPU failures, asset lookups and configuration problems all surface
//! through `EngineError`. Callers that only need to attach context use the
//! `ErrorContext` extension trait instead of building variants by hand.

use thiserror::Error;

/// Result alias used across the engine
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("GPU initialization failed: {message}")]
    GpuInit { message: String },

    #[error("Surface creation failed: {message}")]
    SurfaceCreation { message: String },

    #[error("Device creation failed: {message}")]
    DeviceCreation { message: String },

    #[error("Failed to create pipeline '{pipeline}': {error}")]
    PipelineCreation { pipeline: String, error: String },

    #[error("GPU operation '{operation}' failed: {error}")]
    GpuOperationFailed { operation: String, error: String },

    #[error("Asset not found: {kind} '{name}'")]
    AssetNotFound { kind: &'static str, name: String },

    #[error("Constant buffer '{buffer}' index {index} out of range (capacity {capacity})")]
    ConstantIndexOutOfRange {
        buffer: &'static str,
        index: usize,
        capacity: usize,
    },

    #[error("Capacity exceeded for {what}: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        what: &'static str,
        requested: usize,
        capacity: usize,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("IO error at {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {error}")]
    ConfigParse { error: String },

    #[error("Internal error in {component}: {message}")]
    Internal { component: String, message: String },
}

/// Attach component context to foreign errors
pub trait ErrorContext<T> {
    fn engine_context(self, component: &str) -> EngineResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn engine_context(self, component: &str) -> EngineResult<T> {
        self.map_err(|e| EngineError::Internal {
            component: component.to_string(),
            message: e.to_string(),
        })
    }
}

/// Create a GPU operation error
pub fn gpu_operation_error(operation: &str, error: impl std::fmt::Display) -> EngineError {
    EngineError::GpuOperationFailed {
        operation: operation.to_string(),
        error: error.to_string(),
    }
}

/// Create a pipeline creation error
pub fn pipeline_creation_error(pipeline: &str, error: impl std::fmt::Display) -> EngineError {
    EngineError::PipelineCreation {
        pipeline: pipeline.to_string(),
        error: error.to_string(),
    }
}
