// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::DEFAULT_FOCAL_LENGTH;
use crate::errors::{PipelineError, PipelineResult};

/// Policy for frames whose geometry differs from the bound geometry
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum GeometryPolicy {
    /// Reject the frame with a hard error
    #[default]
    Reject,
    /// Silently drop the frame (legacy behavior of older depth stacks)
    Ignore,
}

/// Configuration for the smooth-normals pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Depth-camera focal length in pixels (must be > 0)
    pub focal_length: f32,
    /// Guided-filter edge-preservation parameter
    pub filter_eps: f32,
    /// Guided-filter window size in pixels (must be > 0)
    pub filter_size: u32,
    /// Produce a compressed normals snapshot alongside the full image
    pub compress: bool,
    /// Write one binary dump file per published frame (diagnostic)
    pub dump_frames: bool,
    /// Dump directory override; `None` uses [`crate::constants::DUMP_DIR`]
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,
    /// How to treat frames whose geometry differs after first binding
    pub geometry_policy: GeometryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            focal_length: DEFAULT_FOCAL_LENGTH,
            filter_eps: 0.2 * 0.2 * 0.01,
            filter_size: 10,
            compress: false,
            dump_frames: false, // Diagnostic only, disabled by default
            dump_dir: None,
            geometry_policy: GeometryPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate parameter ranges, returning the config for chaining
    pub fn validate(self) -> PipelineResult<Self> {
        if !(self.focal_length > 0.0) {
            return Err(PipelineError::Config(format!(
                "focal_length must be positive, got {}",
                self.focal_length
            )));
        }
        if self.filter_size == 0 {
            return Err(PipelineError::Config(
                "filter_size must be a positive number of pixels".to_string(),
            ));
        }
        Ok(self)
    }

    /// Parse a configuration from a JSON string
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        serde_json::from_str::<Self>(json)
            .map_err(|e| PipelineError::Config(e.to_string()))?
            .validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_focal_length() {
        let config = PipelineConfig {
            focal_length: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_filter_size() {
        let config = PipelineConfig {
            filter_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json() {
        let config = PipelineConfig::from_json(
            r#"{
                "focal_length": 540.0,
                "filter_eps": 0.001,
                "filter_size": 6,
                "compress": true,
                "dump_frames": false,
                "geometry_policy": "Reject"
            }"#,
        )
        .unwrap();
        assert_eq!(config.filter_size, 6);
        assert!(config.compress);
    }
}
