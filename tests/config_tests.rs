// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use depth_normals::{GeometryPolicy, PipelineConfig};

#[test]
fn test_config_default() {
    let config = PipelineConfig::default();

    assert!(
        config.focal_length > 0.0,
        "Default focal length should be positive"
    );
    assert!(
        !config.compress,
        "Compression should be disabled by default"
    );
    assert!(
        !config.dump_frames,
        "Frame dumping should be disabled by default"
    );
    assert_eq!(
        config.geometry_policy,
        GeometryPolicy::Reject,
        "Mismatched geometry should be rejected by default"
    );
}

#[test]
fn test_config_json_round_trip() {
    let config = PipelineConfig {
        compress: true,
        filter_size: 8,
        ..Default::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    let parsed = PipelineConfig::from_json(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_from_json_rejects_invalid_ranges() {
    let json = serde_json::to_string(&PipelineConfig {
        focal_length: -1.0,
        ..Default::default()
    })
    .unwrap();
    assert!(PipelineConfig::from_json(&json).is_err());
}
