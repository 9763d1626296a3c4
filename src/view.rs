// SPDX-License-Identifier: GPL-3.0-only

//! Visualization adapters
//!
//! Read-only views over the pipeline's outputs, driven on the consumer's
//! schedule rather than by frame arrival:
//! - Depth view: filtered depth mapped to a false-color image
//! - Normals view: snapshot mapped to an 8-bit color image, optionally with
//!   a compressed-representation image and a near-unit-length point set
//!
//! Rendering itself stays behind the injected sink traits.

use crate::constants::{
    DEPTH_DISPLAY_MAX_M, DEPTH_DISPLAY_MIN_M, NORMAL_DISPLAY_OFFSET, NORMAL_DISPLAY_SCALE,
    UNIT_NORM_SQ_MAX, UNIT_NORM_SQ_MIN,
};
use crate::snapshot::SharedNormalsState;
use tracing::warn;

/// Presents 2-D color images by name
pub trait ImageSink {
    /// `rgb` is 3 bytes per pixel, row-major
    fn present_image(&mut self, name: &str, rgb: &[u8], width: u32, height: u32);
}

/// Presents named 3-D point sets; an upsert replaces the previous set
pub trait PointSink {
    fn upsert_points(&mut self, name: &str, points: &[[f32; 3]]);
}

/// Turbo colormap: perceptually uniform rainbow (blue=near, red=far)
///
/// Based on: https://ai.googleblog.com/2019/08/turbo-improved-rainbow-colormap-for.html
/// Simplified version with polynomial approximation.
#[inline]
fn turbo(t: f32) -> [u8; 3] {
    let r = (0.13572138
        + t * (4.6153926 + t * (-42.66032 + t * (132.13108 + t * (-152.54825 + t * 59.28144)))))
        .clamp(0.0, 1.0);
    let g = (0.09140261
        + t * (2.19418 + t * (4.84296 + t * (-14.18503 + t * (4.27805 + t * 2.53377)))))
        .clamp(0.0, 1.0);
    let b = (0.1066733
        + t * (12.64194 + t * (-60.58204 + t * (109.99648 + t * (-82.52904 + t * 20.43388)))))
        .clamp(0.0, 1.0);
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Map filtered depth (meters) to a false-color RGB image over a fixed range.
/// Zero depth marks missing data and renders black.
pub fn depth_to_false_color(depth_m: &[f32], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width as usize) * (height as usize);
    let mut rgb = Vec::with_capacity(pixel_count.min(depth_m.len()) * 3);
    let span = DEPTH_DISPLAY_MAX_M - DEPTH_DISPLAY_MIN_M;

    for &d in depth_m.iter().take(pixel_count) {
        if d <= 0.0 {
            rgb.extend_from_slice(&[0, 0, 0]);
        } else {
            let t = ((d - DEPTH_DISPLAY_MIN_M) / span).clamp(0.0, 1.0);
            rgb.extend_from_slice(&turbo(t));
        }
    }
    rgb
}

/// Map one normal component in [-1, 1] to a display byte.
/// Rounds half away from zero, so 0.0 maps to 128.
#[inline]
pub fn normal_component_to_u8(value: f32) -> u8 {
    (value * NORMAL_DISPLAY_SCALE + NORMAL_DISPLAY_OFFSET)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Map a normals image (3 x f32 per pixel) to 8-bit RGB
pub fn normals_to_rgb8(normals: &[f32]) -> Vec<u8> {
    normals.iter().map(|&v| normal_component_to_u8(v)).collect()
}

/// Swap the first and third channel of a 3-channel image in place
/// (RGB to BGR or back, whichever the target renderer wants)
pub fn swap_channel_order(image: &mut [u8]) {
    for px in image.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

/// Build the 3-D point set for the normals view: one point per pixel whose
/// vector is near unit length. Rejects invalid and depth-discontinuity
/// pixels, whose normals are zeroed or denormalized.
pub fn unit_normal_points(normals: &[f32]) -> Vec<[f32; 3]> {
    normals
        .chunks_exact(3)
        .filter_map(|n| {
            let norm_sq = n[0] * n[0] + n[1] * n[1] + n[2] * n[2];
            if (UNIT_NORM_SQ_MIN..=UNIT_NORM_SQ_MAX).contains(&norm_sq) {
                Some([n[0], n[1], n[2]])
            } else {
                None
            }
        })
        .collect()
}

/// Render the normals view from the shared snapshot.
///
/// Stateless per call; reads whatever snapshot is current when the lock is
/// acquired. A no-op before the first publish. The point sink is optional
/// (not every shell has a 3-D renderer).
pub fn render_normals_view(
    shared: &SharedNormalsState,
    image_sink: &mut dyn ImageSink,
    mut point_sink: Option<&mut dyn PointSink>,
) {
    shared.read(|snapshot| {
        let mut rgb = normals_to_rgb8(&snapshot.normals);
        swap_channel_order(&mut rgb);
        image_sink.present_image("normals", &rgb, snapshot.width, snapshot.height);

        if let Some(compressed) = &snapshot.compressed {
            // The compressed encoding is opaque and engine-defined; it only
            // renders when it happens to be f32-shaped
            if compressed.data.len() % std::mem::size_of::<f32>() == 0 {
                let values: Vec<f32> = bytemuck::pod_collect_to_vec(&compressed.data);
                let rgb = normals_to_rgb8(&values);
                let pixels = (rgb.len() / 3) as u32;
                if pixels > 0 {
                    image_sink.present_image("dcomp", &rgb, pixels, 1);
                }
            } else {
                warn!(
                    len = compressed.data.len(),
                    "Compressed snapshot is not f32-shaped, skipping its view"
                );
            }
        }

        if let Some(sink) = point_sink.as_deref_mut() {
            let points = unit_normal_points(&snapshot.normals);
            if !points.is_empty() {
                sink.upsert_points("pc", &points);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_affine_map_endpoints() {
        assert_eq!(normal_component_to_u8(-1.0), 0);
        assert_eq!(normal_component_to_u8(1.0), 255);
        // Half-away-from-zero rounding: 0.0 * 127.5 + 127.5 = 127.5 -> 128
        assert_eq!(normal_component_to_u8(0.0), 128);
    }

    #[test]
    fn test_affine_map_clamps() {
        assert_eq!(normal_component_to_u8(-1.5), 0);
        assert_eq!(normal_component_to_u8(1.5), 255);
    }

    #[test]
    fn test_normals_to_rgb8_corners() {
        let normals = vec![-1.0, -1.0, -1.0, 1.0, 1.0, 1.0];
        assert_eq!(normals_to_rgb8(&normals), vec![0, 0, 0, 255, 255, 255]);
    }

    #[test]
    fn test_unit_norm_filter_window() {
        // norm^2 of 0.5, 0.99, 1.0, 1.01, 1.5; only the middle three survive
        let normals: Vec<f32> = [0.5f32, 0.99, 1.0, 1.01, 1.5]
            .iter()
            .flat_map(|&sq| [0.0, 0.0, sq.sqrt()])
            .collect();
        let points = unit_normal_points(&normals);
        assert_eq!(points.len(), 3);
        for p in &points {
            let norm_sq = p[0] * p[0] + p[1] * p[1] + p[2] * p[2];
            assert!((0.98..=1.02).contains(&norm_sq));
        }
    }

    #[test]
    fn test_swap_channel_order() {
        let mut image = vec![1, 2, 3, 4, 5, 6];
        swap_channel_order(&mut image);
        assert_eq!(image, vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_depth_false_color_invalid_is_black() {
        let rgb = depth_to_false_color(&[0.0, -1.0], 2, 1);
        assert_eq!(rgb, vec![0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_depth_false_color_large_geometry_does_not_overflow() {
        // width * height exceeds u32; the output is still bounded by the
        // depth data actually present
        let rgb = depth_to_false_color(&[1.0], 1 << 16, 1 << 16);
        assert_eq!(rgb.len(), 3);
    }

    #[test]
    fn test_depth_false_color_range() {
        // Near and far ends of the display range produce different colors
        let rgb = depth_to_false_color(&[0.3, 4.0], 2, 1);
        assert_ne!(&rgb[0..3], &rgb[3..6]);
    }
}
