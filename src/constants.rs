// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline constants - Single source of truth
//!
//! Depth display range, normal display mapping, and point-set filtering
//! constants used across the pipeline.

/// Depth display range for false-color visualization (meters)
pub const DEPTH_DISPLAY_MIN_M: f32 = 0.3;
pub const DEPTH_DISPLAY_MAX_M: f32 = 4.0;

/// Affine map from a unit-normal component in [-1, 1] to a display byte:
/// `display = value * NORMAL_DISPLAY_SCALE + NORMAL_DISPLAY_OFFSET`
/// Rounded half away from zero, so 0.0 maps to 128.
pub const NORMAL_DISPLAY_SCALE: f32 = 127.5;
pub const NORMAL_DISPLAY_OFFSET: f32 = 127.5;

/// Squared-norm window for the near-unit-length point-set filter.
/// Pixels outside this window carry invalid or edge normals.
pub const UNIT_NORM_SQ_MIN: f32 = 0.98;
pub const UNIT_NORM_SQ_MAX: f32 = 1.02;

/// Directory for the diagnostic per-frame dump (relative to the working dir)
pub const DUMP_DIR: &str = "normals";

/// Compute shader workgroup edge (threads per workgroup is the square)
pub const WORKGROUP_SIZE: u32 = 16;

/// Default depth-camera focal length (pixels) at 640x480, Kinect v1 depth sensor
pub const DEFAULT_FOCAL_LENGTH: f32 = 594.21;
