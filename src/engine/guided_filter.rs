// SPDX-License-Identifier: GPL-3.0-only

//! GPU guided-filter smoothing engine
//!
//! Smooths a raw 16-bit depth frame into an f32 depth buffer (meters) with
//! an edge-preserving guided filter, the depth map acting as its own
//! guidance signal. Bound to a fixed geometry for the stream's lifetime.

use std::sync::Arc;
use tracing::debug;

use super::gpu::{frame_dispatch, read_buffer_blocking};
use super::{DepthSmoother, FilteredDepth};
use crate::errors::{PipelineError, PipelineResult};

/// Guided-filter parameters
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FilterParams {
    width: u32,
    height: u32,
    radius: u32,
    eps: f32,
}

/// Guided-filter shader source
const GUIDED_FILTER_SHADER: &str = include_str!("guided_filter.wgsl");

/// GPU guided-filter depth smoothing engine
pub struct GuidedDepthFilter {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    width: u32,
    height: u32,
    coefficients_pipeline: wgpu::ComputePipeline,
    smooth_pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    input_buffer: wgpu::Buffer,
    filtered_buffer: wgpu::Buffer,
    staging_buffer: wgpu::Buffer,
    // Raw depth widened to u32 for the storage buffer, reused across frames
    upload_scratch: Vec<u32>,
}

impl GuidedDepthFilter {
    /// Create a smoothing engine bound to the given frame geometry
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        width: u32,
        height: u32,
        eps: f32,
        filter_size: u32,
    ) -> PipelineResult<Self> {
        if width == 0 || height == 0 {
            return Err(PipelineError::EngineInit(format!(
                "Degenerate geometry {}x{}",
                width, height
            )));
        }

        debug!(width, height, eps, filter_size, "Allocating guided filter resources");

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("guided_filter_shader"),
            source: wgpu::ShaderSource::Wgsl(GUIDED_FILTER_SHADER.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("guided_filter_bind_group_layout"),
            entries: &[
                // Raw depth input (u16 widened to u32)
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
                // Linear coefficient a
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
                // Linear coefficient b
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
                // Filtered depth output
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
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
                    binding: 4,
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
            label: Some("guided_filter_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let coefficients_pipeline =
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("guided_filter_coefficients_pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("coefficients"),
                compilation_options: Default::default(),
                cache: None,
            });

        let smooth_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("guided_filter_smooth_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("smooth"),
            compilation_options: Default::default(),
            cache: None,
        });

        let pixel_count = (width as u64) * (height as u64);
        let f32_size = pixel_count * 4;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("guided_filter_uniform_buffer"),
            size: std::mem::size_of::<FilterParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let input_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("guided_filter_input_buffer"),
            size: f32_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let coeff_a_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("guided_filter_coeff_a_buffer"),
            size: f32_size,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let coeff_b_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("guided_filter_coeff_b_buffer"),
            size: f32_size,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let filtered_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("guided_filter_output_buffer"),
            size: f32_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("guided_filter_staging_buffer"),
            size: f32_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        // Geometry is fixed, so one bind group serves every frame
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("guided_filter_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: coeff_a_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: coeff_b_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: filtered_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        // The window size B covers the full filter box; the shader walks a radius
        let radius = filter_size / 2;
        let params = FilterParams {
            width,
            height,
            radius,
            eps,
        };
        queue.write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&params));

        Ok(Self {
            device,
            queue,
            width,
            height,
            coefficients_pipeline,
            smooth_pipeline,
            bind_group,
            input_buffer,
            filtered_buffer,
            staging_buffer,
            upload_scratch: Vec::with_capacity(pixel_count as usize),
        })
    }
}

impl DepthSmoother for GuidedDepthFilter {
    fn filter(&mut self, depth: &[u16]) -> PipelineResult<()> {
        let pixel_count = (self.width as usize) * (self.height as usize);
        if depth.len() < pixel_count {
            return Err(PipelineError::Compute(format!(
                "Depth frame has {} samples, expected {}",
                depth.len(),
                pixel_count
            )));
        }

        self.upload_scratch.clear();
        self.upload_scratch
            .extend(depth[..pixel_count].iter().map(|&d| d as u32));
        self.queue
            .write_buffer(&self.input_buffer, 0, bytemuck::cast_slice(&self.upload_scratch));

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("guided_filter_encoder"),
            });

        let (workgroups_x, workgroups_y) = frame_dispatch(self.width, self.height);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("guided_filter_coefficients_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.coefficients_pipeline);
            pass.set_bind_group(0, Some(&self.bind_group), &[]);
            pass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
        }

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("guided_filter_smooth_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.smooth_pipeline);
            pass.set_bind_group(0, Some(&self.bind_group), &[]);
            pass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn filtered(&self) -> FilteredDepth<'_> {
        FilteredDepth::Gpu(&self.filtered_buffer)
    }

    fn filtered_image(&mut self) -> PipelineResult<Vec<f32>> {
        let size = (self.width as u64) * (self.height as u64) * 4;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("guided_filter_readback_encoder"),
            });
        encoder.copy_buffer_to_buffer(&self.filtered_buffer, 0, &self.staging_buffer, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let bytes = read_buffer_blocking(&self.device, &self.staging_buffer)
            .map_err(PipelineError::Compute)?;
        Ok(bytemuck::cast_slice(&bytes).to_vec())
    }
}
