// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use stillcam::ControllerConfig;
use stillcam::backends::camera::Size;
use stillcam::constants::LayoutOrientation;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = ControllerConfig::default();

    assert_eq!(config.af_frame_limit, 60);
    assert_eq!(config.ae_frame_limit, 60);
    assert_eq!(config.close_timeout(), Duration::from_millis(1000));
    assert_eq!(config.max_preview, Size::new(1920, 1080));
    assert_eq!(config.layout, LayoutOrientation::Portrait);
    assert!(
        config.photo_path.ends_with("stillcam/photo.jpg"),
        "Photo should default into the stillcam folder"
    );
}

#[test]
fn test_missing_file_loads_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = ControllerConfig::load(&dir.path().join("absent.json")).unwrap();
    assert_eq!(config, ControllerConfig::default());
}

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = ControllerConfig {
        photo_path: dir.path().join("shot.jpg"),
        layout: LayoutOrientation::Landscape,
        af_frame_limit: 12,
        ..ControllerConfig::default()
    };
    config.save(&path).unwrap();

    assert_eq!(ControllerConfig::load(&path).unwrap(), config);
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "ae_frame_limit": 5, "layout": "landscape" }"#).unwrap();

    let config = ControllerConfig::load(&path).unwrap();
    assert_eq!(config.ae_frame_limit, 5);
    assert_eq!(config.layout, LayoutOrientation::Landscape);
    assert_eq!(config.af_frame_limit, 60);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    let error = ControllerConfig::load(&path).unwrap_err();
    assert!(error.to_string().contains("config.json"));
}
