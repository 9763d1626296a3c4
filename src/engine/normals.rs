// SPDX-License-Identifier: GPL-3.0-only

//! GPU normal-extraction engine
//!
//! Computes per-pixel unit surface normals and a validity mask from a
//! smoothed depth buffer and the depth-camera focal length. Optionally
//! produces a compressed snapshot holding only the valid normals.

use std::sync::Arc;
use tracing::debug;

use super::gpu::{frame_dispatch, read_buffer_blocking};
use super::{FilteredDepth, NormalExtractor};
use crate::errors::{PipelineError, PipelineResult};

/// Normal-extraction parameters
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct NormalParams {
    width: u32,
    height: u32,
    focal_length: f32,
    _pad: u32,
}

/// Normal-extraction shader source
const NORMALS_SHADER: &str = include_str!("normals.wgsl");

/// GPU normal-extraction engine
pub struct NormalStage {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    width: u32,
    height: u32,
    compress: bool,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    // Upload target when the filtered depth arrives as a CPU slice
    cpu_depth_buffer: wgpu::Buffer,
    normals_buffer: wgpu::Buffer,
    validity_buffer: wgpu::Buffer,
    staging_normals: wgpu::Buffer,
    staging_validity: wgpu::Buffer,
}

impl NormalStage {
    /// Create a normal-extraction engine bound to the given geometry
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        focal_length: f32,
        width: u32,
        height: u32,
        compress: bool,
    ) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::EngineInit(format!(
                "Degenerate geometry {}x{}",
                width, height
            )));
        }

        debug!(width, height, focal_length, compress, "Allocating normal extraction resources");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("normals_shader"),
            source: wgpu::ShaderSource::Wgsl(NORMALS_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("normals_bind_group_layout"),
            entries: &[
                // Filtered depth input
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Normals output (3 x f32 per pixel)
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Validity mask output (u32 per pixel)
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Uniform parameters
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("normals_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("normals_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let pixel_count = (width as u64) * (height as u64);
        let normals_size = pixel_count * 3 * 4;
        let mask_size = pixel_count * 4;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normals_uniform_buffer"),
            size: std::mem::size_of::<NormalParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let cpu_depth_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normals_cpu_depth_buffer"),
            size: mask_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let normals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normals_output_buffer"),
            size: normals_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let validity_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normals_validity_buffer"),
            size: mask_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_normals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normals_staging_buffer"),
            size: normals_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let staging_validity = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("normals_staging_validity_buffer"),
            size: mask_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let params = NormalParams {
            width,
            height,
            focal_length,
            _pad: 0,
        };
        queue.write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&params));

        Ok(Self {
            device,
            queue,
            width,
            height,
            compress,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            cpu_depth_buffer,
            normals_buffer,
            validity_buffer,
            staging_normals,
            staging_validity,
        })
    }

    fn read_staged(&self, src: &wgpu::Buffer, staging: &wgpu::Buffer, size: u64) -> PipelineResult<Vec<u8>> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("normals_readback_encoder"),
            });
        encoder.copy_buffer_to_buffer(src, 0, staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));
        read_buffer_blocking(&self.device, staging).map_err(PipelineError::Compute)
    }
}

impl NormalExtractor for NormalStage {
    fn compute(&mut self, filtered: FilteredDepth<'_>) -> PipelineResult<()> {
        // The input binding depends on where the filtered depth lives, so the
        // bind group is built per call; everything else is fixed per stream.
        let depth_binding = match filtered {
            FilteredDepth::Gpu(buffer) => buffer.as_entire_binding(),
            FilteredDepth::Cpu(depth) => {
                let pixel_count = (self.width as usize) * (self.height as usize);
                if depth.len() < pixel_count {
                    return Err(PipelineError::Compute(format!(
                        "Filtered depth has {} samples, expected {}",
                        depth.len(),
                        pixel_count
                    )));
                }
                self.queue.write_buffer(
                    &self.cpu_depth_buffer,
                    0,
                    bytemuck::cast_slice(&depth[..pixel_count]),
                );
                self.cpu_depth_buffer.as_entire_binding()
            }
        };

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("normals_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: depth_binding,
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.normals_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.validity_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("normals_encoder"),
            });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("normals_compute_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, Some(&bind_group), &[]);
            let (workgroups_x, workgroups_y) = frame_dispatch(self.width, self.height);
            pass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn normals_image(&mut self) -> PipelineResult<Vec<f32>> {
        let size = (self.width as u64) * (self.height as u64) * 3 * 4;
        let bytes = self.read_staged(&self.normals_buffer, &self.staging_normals, size)?;
        Ok(bytemuck::cast_slice(&bytes).to_vec())
    }

    fn validity_mask(&mut self) -> PipelineResult<Vec<u8>> {
        let size = (self.width as u64) * (self.height as u64) * 4;
        let bytes = self.read_staged(&self.validity_buffer, &self.staging_validity, size)?;
        let mask_u32: &[u32] = bytemuck::cast_slice(&bytes);
        Ok(mask_u32.iter().map(|&v| v as u8).collect())
    }

    fn compressed(&mut self) -> PipelineResult<Option<(Vec<u8>, u32)>> {
        if !self.compress {
            return Ok(None);
        }

        // Compaction: keep only the normals the mask marks valid, packed as
        // consecutive f32 triples. Opaque to consumers beyond its length.
        let normals = self.normals_image()?;
        let mask = self.validity_mask()?;

        let mut packed: Vec<f32> = Vec::new();
        for (i, &valid) in mask.iter().enumerate() {
            if valid != 0 {
                packed.extend_from_slice(&normals[i * 3..i * 3 + 3]);
            }
        }

        let count = (packed.len() / 3) as u32;
        Ok(Some((bytemuck::cast_slice(&packed).to_vec(), count)))
    }
}
