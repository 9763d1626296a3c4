// SPDX-License-Identifier: GPL-3.0-only

//! depth-normals - Real-time depth smoothing and surface-normal extraction
//!
//! This library turns raw 16-bit depth-camera frames into smoothed depth and
//! per-pixel surface normals on the GPU, and publishes tear-free CPU
//! snapshots to a visualization consumer running at its own cadence.
//!
//! # Architecture
//!
//! - [`pipeline`]: per-frame orchestration (lazy engine binding, smoothing,
//!   normal extraction, publication)
//! - [`engine`]: the smoothing and normal-extraction engine seams plus the
//!   default wgpu-backed implementations
//! - [`snapshot`]: the mutex-guarded state shared with the visualization
//!   thread
//! - [`view`]: read-only visualization adapters (depth false-color, normals
//!   image, near-unit-length point set)
//! - [`config`]: pipeline configuration handling
//! - [`dump`]: optional diagnostic per-frame dump
//!
//! # Example
//!
//! ```ignore
//! let mut pipeline = SmoothNormalsPipeline::with_gpu(PipelineConfig::default())?;
//! let shared = pipeline.shared_state();
//!
//! // Capture thread, once per sensor frame:
//! pipeline.process_frame(&depth, width, height)?;
//!
//! // Visualization thread, on its own schedule:
//! render_normals_view(&shared, &mut image_sink, Some(&mut point_sink));
//! ```

pub mod config;
pub mod constants;
pub mod dump;
pub mod engine;
pub mod errors;
pub mod pipeline;
pub mod snapshot;
pub mod view;

// Re-export commonly used types
pub use config::{GeometryPolicy, PipelineConfig};
pub use engine::{DepthSmoother, EngineFactory, FilteredDepth, NormalExtractor};
pub use errors::{PipelineError, PipelineResult};
pub use pipeline::SmoothNormalsPipeline;
pub use snapshot::{CompressedNormals, NormalsSnapshot, SharedNormalsState};
pub use view::{ImageSink, PointSink, render_normals_view};
