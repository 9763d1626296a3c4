// SPDX-License-Identifier: GPL-3.0-only

//! Frame-processing orchestration
//!
//! Drives one depth stream: lazy engine binding on the first valid frame,
//! per-frame smoothing then normal extraction in strict order, and tear-free
//! publication of the results to the shared visualization state.
//!
//! Processing is synchronous on the calling thread and strictly sequential
//! across frames. There is no cancellation point: if an engine hangs, the
//! capture thread hangs with it. That is an accepted constraint of this
//! stage, not a recovery gap.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{GeometryPolicy, PipelineConfig};
use crate::constants::DUMP_DIR;
use crate::dump::FrameDumper;
use crate::engine::{DepthSmoother, EngineFactory, GpuEngineFactory, NormalExtractor};
use crate::errors::{PipelineError, PipelineResult};
use crate::snapshot::{CompressedNormals, NormalsSnapshot, SharedNormalsState};
use crate::view::{ImageSink, depth_to_false_color};

/// Orchestrator for one depth stream.
///
/// Two states: unbound (no engines, before the first valid frame) and bound
/// (engines constructed for the observed geometry). The transition happens
/// exactly once; teardown is the object's drop.
pub struct SmoothNormalsPipeline {
    config: PipelineConfig,
    factory: Box<dyn EngineFactory>,
    smoother: Option<Box<dyn DepthSmoother>>,
    extractor: Option<Box<dyn NormalExtractor>>,
    geometry: Option<(u32, u32)>,
    shared: Arc<SharedNormalsState>,
    dumper: Option<FrameDumper>,
    frames_processed: u64,
    last_compressed_count: u32,
}

impl SmoothNormalsPipeline {
    /// Create an unbound pipeline over the given engine factory
    pub fn new(config: PipelineConfig, factory: Box<dyn EngineFactory>) -> PipelineResult<Self> {
        let config = config.validate()?;
        let dumper = config.dump_frames.then(|| {
            let dir = config
                .dump_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(DUMP_DIR));
            FrameDumper::new(dir)
        });
        Ok(Self {
            config,
            factory,
            smoother: None,
            extractor: None,
            geometry: None,
            shared: Arc::new(SharedNormalsState::new()),
            dumper,
            frames_processed: 0,
            last_compressed_count: 0,
        })
    }

    /// Create an unbound pipeline backed by the default wgpu engines
    pub fn with_gpu(config: PipelineConfig) -> PipelineResult<Self> {
        Self::new(config, Box::new(GpuEngineFactory::new()?))
    }

    /// Shared state handle for the visualization thread
    pub fn shared_state(&self) -> Arc<SharedNormalsState> {
        Arc::clone(&self.shared)
    }

    /// Whether the engines have been constructed yet
    pub fn is_bound(&self) -> bool {
        self.geometry.is_some()
    }

    /// Geometry the stream was bound to, if bound
    pub fn bound_geometry(&self) -> Option<(u32, u32)> {
        self.geometry
    }

    /// Frames fully processed and published so far
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    /// Element count the engine reported for the last compressed snapshot
    pub fn last_compressed_count(&self) -> u32 {
        self.last_compressed_count
    }

    /// Process one raw depth frame: bind lazily, smooth, extract normals,
    /// publish. The slice is borrowed for the duration of the call only.
    ///
    /// Zero-sized frames are silently ignored. Engine failures are fatal for
    /// this call and propagate; the next frame is processed independently.
    pub fn process_frame(&mut self, depth: &[u16], width: u32, height: u32) -> PipelineResult<()> {
        if width == 0 || height == 0 {
            debug!(width, height, "Skipping degenerate frame");
            return Ok(());
        }

        if let Some(bound) = self.geometry {
            if bound != (width, height) {
                match self.config.geometry_policy {
                    GeometryPolicy::Reject => {
                        return Err(PipelineError::GeometryMismatch {
                            bound,
                            got: (width, height),
                        });
                    }
                    GeometryPolicy::Ignore => {
                        warn!(
                            bound_width = bound.0,
                            bound_height = bound.1,
                            width,
                            height,
                            "Dropping frame with mismatched geometry"
                        );
                        return Ok(());
                    }
                }
            }
        } else {
            self.bind(width, height)?;
        }

        let smoother = self
            .smoother
            .as_mut()
            .ok_or_else(|| PipelineError::Compute("Smoothing engine not bound".to_string()))?;
        let extractor = self
            .extractor
            .as_mut()
            .ok_or_else(|| PipelineError::Compute("Normal engine not bound".to_string()))?;

        // Strict per-frame order: filter completes before extraction starts,
        // and extraction consumes this frame's filtered buffer only
        smoother.filter(depth)?;
        extractor.compute(smoother.filtered())?;

        self.publish(width, height)?;
        self.frames_processed += 1;
        Ok(())
    }

    /// Render the smoothed-depth view into the given sink. A no-op while
    /// unbound. Reads engine-owned memory, so this must run on the
    /// processing thread (the snapshot path is the cross-thread one).
    pub fn render_depth_view(&mut self, sink: &mut dyn ImageSink) -> PipelineResult<()> {
        let (width, height) = match self.geometry {
            Some(g) => g,
            None => return Ok(()),
        };
        let smoother = self
            .smoother
            .as_mut()
            .ok_or_else(|| PipelineError::Compute("Smoothing engine not bound".to_string()))?;
        let depth_m = smoother.filtered_image()?;
        let rgb = depth_to_false_color(&depth_m, width, height);
        sink.present_image("depth", &rgb, width, height);
        Ok(())
    }

    /// Construct both engines for the observed geometry. Called at most once
    /// per stream; allocation failure is fatal and leaves the pipeline
    /// unbound.
    fn bind(&mut self, width: u32, height: u32) -> PipelineResult<()> {
        info!(
            width,
            height,
            eps = self.config.filter_eps,
            filter_size = self.config.filter_size,
            focal_length = self.config.focal_length,
            compress = self.config.compress,
            "Binding engines to first observed frame geometry"
        );

        let smoother = self.factory.create_smoother(
            width,
            height,
            self.config.filter_eps,
            self.config.filter_size,
        )?;
        let extractor = self.factory.create_extractor(
            self.config.focal_length,
            width,
            height,
            self.config.compress,
        )?;

        self.smoother = Some(smoother);
        self.extractor = Some(extractor);
        self.geometry = Some((width, height));
        Ok(())
    }

    /// Copy the frame's results out of the engine and swap them into the
    /// shared state. GPU readback happens before the lock is taken; the
    /// critical section is the swap only.
    fn publish(&mut self, width: u32, height: u32) -> PipelineResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        let extractor = self
            .extractor
            .as_mut()
            .ok_or_else(|| PipelineError::Compute("Normal engine not bound".to_string()))?;

        let normals = extractor.normals_image()?;
        let validity = extractor.validity_mask()?;

        let compressed = if self.config.compress {
            match extractor.compressed()? {
                Some((data, reported_count)) => {
                    info!(count = reported_count, "Compressed normals snapshot");
                    self.last_compressed_count = reported_count;
                    Some(CompressedNormals {
                        data,
                        reported_count,
                    })
                }
                None => None,
            }
        } else {
            None
        };

        if let Some(dumper) = self.dumper.as_mut() {
            // Compressed form when available, raw normals otherwise
            match &compressed {
                Some(c) => dumper.write(&c.data),
                None => dumper.write(bytemuck::cast_slice(&normals)),
            }
        }

        self.shared.publish(NormalsSnapshot {
            normals,
            validity,
            width,
            height,
            compressed,
        });
        Ok(())
    }
}
