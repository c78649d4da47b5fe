// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for camera and size selection

use stillcam::backends::camera::simulated::{SimulatedCamera, SimulatedPlatform};
use stillcam::backends::camera::{CameraPlatform, Size, strategy};
use stillcam::constants::LayoutOrientation;

#[test]
fn test_default_platform_starts_on_back_camera() {
    let platform = SimulatedPlatform::default();
    assert_eq!(
        strategy::choose_default_camera(&platform).unwrap(),
        Some("0".to_string())
    );
}

#[test]
fn test_no_cameras() {
    let platform = SimulatedPlatform::new(Vec::new());
    assert_eq!(strategy::choose_default_camera(&platform).unwrap(), None);
}

#[test]
fn test_switch_alternates_facing() {
    let platform = SimulatedPlatform::default();
    assert_eq!(strategy::switch_camera(&platform, "0").unwrap(), "1");
    assert_eq!(strategy::switch_camera(&platform, "1").unwrap(), "0");
}

#[test]
fn test_switch_with_one_camera_keeps_it() {
    let platform = SimulatedPlatform::new(vec![SimulatedCamera::back("only")]);
    assert_eq!(strategy::switch_camera(&platform, "only").unwrap(), "only");
}

#[test]
fn test_switch_between_same_facing_cycles() {
    let platform = SimulatedPlatform::new(vec![
        SimulatedCamera::back("a"),
        SimulatedCamera::back("b"),
        SimulatedCamera::back("c"),
    ]);
    assert_eq!(strategy::switch_camera(&platform, "a").unwrap(), "b");
    assert_eq!(strategy::switch_camera(&platform, "c").unwrap(), "a");
}

#[test]
fn test_front_camera_sizes() {
    let platform = SimulatedPlatform::default();
    let characteristics = platform.characteristics("1").unwrap();

    let preview = strategy::preview_size(&characteristics, Size::new(1920, 1080)).unwrap();
    assert_eq!(preview, Size::new(1920, 1080));
    // 3264x1836 is the only 16:9 JPEG size
    assert_eq!(
        strategy::still_size(&characteristics, preview),
        Size::new(3264, 1836)
    );
    assert_eq!(
        strategy::view_aspect_ratio(preview, LayoutOrientation::Portrait),
        Size::new(1080, 1920)
    );
}

#[test]
fn test_small_preview_limit() {
    let platform = SimulatedPlatform::default();
    let characteristics = platform.characteristics("0").unwrap();

    let preview = strategy::preview_size(&characteristics, Size::new(800, 600)).unwrap();
    assert_eq!(preview, Size::new(640, 480));
    assert_eq!(
        strategy::still_size(&characteristics, preview),
        Size::new(4032, 3024)
    );
}
