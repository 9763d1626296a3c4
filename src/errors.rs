// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the depth-normals pipeline

use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Main pipeline error type
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Engine construction failed (e.g., GPU allocation)
    EngineInit(String),
    /// Device/compute failure during filtering or normal extraction
    Compute(String),
    /// Frame geometry does not match the geometry the stream was bound to
    GeometryMismatch { bound: (u32, u32), got: (u32, u32) },
    /// GPU device or adapter setup failed
    Gpu(String),
    /// Configuration errors
    Config(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::EngineInit(msg) => write!(f, "Engine construction failed: {}", msg),
            PipelineError::Compute(msg) => write!(f, "Compute failed: {}", msg),
            PipelineError::GeometryMismatch { bound, got } => write!(
                f,
                "Frame geometry {}x{} does not match bound geometry {}x{}",
                got.0, got.1, bound.0, bound.1
            ),
            PipelineError::Gpu(msg) => write!(f, "GPU error: {}", msg),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

// GPU setup helpers report plain strings; fold them into the Gpu variant
impl From<String> for PipelineError {
    fn from(msg: String) -> Self {
        PipelineError::Gpu(msg)
    }
}

impl From<&str> for PipelineError {
    fn from(msg: &str) -> Self {
        PipelineError::Gpu(msg.to_string())
    }
}
