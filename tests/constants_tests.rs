// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use stillcam::constants::{
    DEFAULT_CONVERGENCE_FRAME_LIMIT, IMAGE_SINK_CAPACITY, LayoutOrientation, SIS_CAMERA_ID,
};

#[test]
fn test_layout_default() {
    assert_eq!(LayoutOrientation::default(), LayoutOrientation::Portrait);
}

#[test]
fn test_layout_serializes_lowercase() {
    let json = serde_json::to_string(&LayoutOrientation::Landscape).unwrap();
    assert_eq!(json, "\"landscape\"");
}

#[test]
fn test_saved_state_key() {
    // Hosts persist this key; renaming it loses the saved camera
    assert_eq!(SIS_CAMERA_ID, "SIS_CAMERA_ID");
}

#[test]
fn test_capture_limits() {
    assert_eq!(DEFAULT_CONVERGENCE_FRAME_LIMIT, 60);
    assert_eq!(IMAGE_SINK_CAPACITY, 1);
}
