// SPDX-License-Identifier: GPL-3.0-only

//! Engine seams for the smooth-normals pipeline
//!
//! The pipeline drives two stateful collaborators: a depth smoother and a
//! normal extractor. Both are bound to a fixed frame geometry at construction
//! and live for the stream's lifetime. The traits here are the seam the
//! orchestrator calls through; `gpu` plus the wgpu-backed implementations in
//! `guided_filter` and `normals` provide the default engines.

pub mod gpu;
mod guided_filter;
mod normals;

pub use guided_filter::GuidedDepthFilter;
pub use normals::NormalStage;

use std::sync::Arc;

use crate::errors::{PipelineError, PipelineResult};

/// Borrowed handle to a smoother's filtered depth output.
///
/// Valid only until the next `filter` call on the owning engine; consumers
/// must finish any copy before that call is issued.
pub enum FilteredDepth<'a> {
    /// GPU-resident f32 depth buffer, one value per pixel
    Gpu(&'a wgpu::Buffer),
    /// CPU-resident depth, used by stub engines in tests
    Cpu(&'a [f32]),
}

/// Guided-filter smoothing stage bound to a fixed (width, height, eps, size)
pub trait DepthSmoother: Send {
    /// Smooth one raw 16-bit depth frame. The slice is borrowed for the
    /// duration of the call only.
    fn filter(&mut self, depth: &[u16]) -> PipelineResult<()>;

    /// Handle to the filtered output of the most recent `filter` call
    fn filtered(&self) -> FilteredDepth<'_>;

    /// CPU copy of the filtered depth (meters), for the depth view
    fn filtered_image(&mut self) -> PipelineResult<Vec<f32>>;
}

/// Normal-extraction stage bound to a fixed (focal, width, height, compress)
pub trait NormalExtractor: Send {
    /// Compute per-pixel normals from the filtered depth of the same frame
    fn compute(&mut self, filtered: FilteredDepth<'_>) -> PipelineResult<()>;

    /// CPU copy of the normals image: 3 x f32 per pixel, unit vectors in [-1, 1]
    fn normals_image(&mut self) -> PipelineResult<Vec<f32>>;

    /// CPU copy of the validity mask: one byte per pixel, nonzero = usable normal
    fn validity_mask(&mut self) -> PipelineResult<Vec<u8>>;

    /// Compressed snapshot and the reported compressed element count.
    /// `None` when the engine was constructed without compression.
    fn compressed(&mut self) -> PipelineResult<Option<(Vec<u8>, u32)>>;
}

/// Constructs both engines for an observed frame geometry.
///
/// The lazy binder calls through this seam exactly once per stream; tests
/// substitute instrumented stub factories.
pub trait EngineFactory: Send {
    fn create_smoother(
        &mut self,
        width: u32,
        height: u32,
        eps: f32,
        filter_size: u32,
    ) -> PipelineResult<Box<dyn DepthSmoother>>;

    fn create_extractor(
        &mut self,
        focal_length: f32,
        width: u32,
        height: u32,
        compress: bool,
    ) -> PipelineResult<Box<dyn NormalExtractor>>;
}

/// Factory producing the wgpu-backed engines on a shared device/queue
pub struct GpuEngineFactory {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
}

impl GpuEngineFactory {
    /// Create a factory on an existing device and queue
    pub fn with_device(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Create a factory on a fresh compute device
    pub fn new() -> PipelineResult<Self> {
        let (device, queue, _info) =
            pollster::block_on(gpu::create_compute_device("smooth_normals_gpu"))
                .map_err(PipelineError::EngineInit)?;
        Ok(Self { device, queue })
    }
}

impl EngineFactory for GpuEngineFactory {
    fn create_smoother(
        &mut self,
        width: u32,
        height: u32,
        eps: f32,
        filter_size: u32,
    ) -> PipelineResult<Box<dyn DepthSmoother>> {
        let engine = GuidedDepthFilter::new(
            Arc::clone(&self.device),
            Arc::clone(&self.queue),
            width,
            height,
            eps,
            filter_size,
        )?;
        Ok(Box::new(engine))
    }

    fn create_extractor(
        &mut self,
        focal_length: f32,
        width: u32,
        height: u32,
        compress: bool,
    ) -> PipelineResult<Box<dyn NormalExtractor>> {
        let engine = NormalStage::new(
            Arc::clone(&self.device),
            Arc::clone(&self.queue),
            focal_length,
            width,
            height,
            compress,
        )?;
        Ok(Box::new(engine))
    }
}
