// SPDX-License-Identifier: GPL-3.0-only

//! Controller state: lifecycle phase, saved-state bundle and camera selection

use super::PreviewView;
use crate::backends::camera::{CameraCharacteristics, CameraPlatform, Size, strategy};
use crate::config::ControllerConfig;
use crate::constants::LayoutOrientation;
use crate::errors::CameraResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Where the orchestration task currently is
///
/// ```text
/// Idle ─surface─▶ Opening ─▶ SessionOpening ─▶ Previewing
/// Previewing ─shutter─▶ AfWait ─▶ AeWait ─▶ Capturing ─▶ Previewing
/// Previewing ─switch─▶ ClosingSession ─▶ ClosingDevice ─▶ ClosingSink ─▶ Opening
/// any ─pause─▶ ClosingSession ─▶ ClosingDevice ─▶ ClosingSink ─▶ Idle
/// any ─error─▶ Failed
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Opening,
    SessionOpening,
    Previewing,
    AfWait,
    AeWait,
    Capturing,
    ClosingSession,
    ClosingDevice,
    ClosingSink,
    Failed,
}

impl Phase {
    /// Whether a shot is in progress
    pub fn is_shooting(self) -> bool {
        matches!(self, Phase::AfWait | Phase::AeWait | Phase::Capturing)
    }
}

/// Host-provided key/value store for instance state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bundle(BTreeMap<String, String>);

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn put_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }
}

/// The chosen camera and the sizes derived from it
#[derive(Debug, Clone)]
pub struct CameraSelection {
    pub camera_id: String,
    pub characteristics: Arc<CameraCharacteristics>,
    pub preview_size: Size,
    pub still_size: Size,
}

impl CameraSelection {
    /// Look up `camera_id` and pick its preview and still sizes
    pub fn resolve(
        platform: &dyn CameraPlatform,
        camera_id: String,
        config: &ControllerConfig,
    ) -> CameraResult<Self> {
        let characteristics = platform.characteristics(&camera_id)?;
        let preview_size = strategy::preview_size(&characteristics, config.max_preview)?;
        let still_size = strategy::still_size(&characteristics, preview_size);
        info!(
            camera_id = %camera_id,
            lens_facing = %characteristics.lens_facing,
            preview = %preview_size,
            still = %still_size,
            "Camera selected"
        );

        Ok(Self {
            camera_id,
            characteristics: Arc::new(characteristics),
            preview_size,
            still_size,
        })
    }

    /// Tell the view which aspect ratio to lay the preview out at
    pub fn push_aspect_ratio(&self, view: &dyn PreviewView, layout: LayoutOrientation) {
        let ratio = strategy::view_aspect_ratio(self.preview_size, layout);
        view.set_aspect_ratio(ratio.width, ratio.height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::simulated::SimulatedPlatform;
    use crate::backends::camera::{DisplayRotation, LensFacing};
    use std::sync::Mutex;

    #[derive(Default)]
    struct View(Mutex<Option<(u32, u32)>>);

    impl PreviewView for View {
        fn set_aspect_ratio(&self, width: u32, height: u32) {
            *self.0.lock().unwrap() = Some((width, height));
        }
        fn display_rotation(&self) -> DisplayRotation {
            DisplayRotation::Rotation0
        }
    }

    #[test]
    fn test_bundle_roundtrips_as_plain_map() {
        let mut bundle = Bundle::new();
        bundle.put_string("SIS_CAMERA_ID", "1");
        assert_eq!(bundle.get_string("SIS_CAMERA_ID"), Some("1"));
        assert_eq!(bundle.get_string("other"), None);

        let json = serde_json::to_string(&bundle).unwrap();
        assert_eq!(json, r#"{"SIS_CAMERA_ID":"1"}"#);
        assert_eq!(serde_json::from_str::<Bundle>(&json).unwrap(), bundle);
    }

    #[test]
    fn test_resolve_back_camera() {
        let platform = SimulatedPlatform::default();
        let selection =
            CameraSelection::resolve(&platform, "0".into(), &ControllerConfig::default()).unwrap();

        assert_eq!(selection.characteristics.lens_facing, LensFacing::Back);
        assert_eq!(selection.preview_size, Size::new(1920, 1080));
        assert_eq!(selection.still_size, Size::new(4000, 2250));
    }

    #[test]
    fn test_resolve_unknown_camera_fails() {
        let platform = SimulatedPlatform::default();
        assert!(
            CameraSelection::resolve(&platform, "9".into(), &ControllerConfig::default()).is_err()
        );
    }

    #[test]
    fn test_aspect_ratio_follows_layout() {
        let platform = SimulatedPlatform::default();
        let selection =
            CameraSelection::resolve(&platform, "0".into(), &ControllerConfig::default()).unwrap();
        let view = View::default();

        selection.push_aspect_ratio(&view, LayoutOrientation::Portrait);
        assert_eq!(*view.0.lock().unwrap(), Some((1080, 1920)));

        selection.push_aspect_ratio(&view, LayoutOrientation::Landscape);
        assert_eq!(*view.0.lock().unwrap(), Some((1920, 1080)));
    }

    #[test]
    fn test_shooting_phases() {
        assert!(Phase::AfWait.is_shooting());
        assert!(Phase::Capturing.is_shooting());
        assert!(!Phase::Previewing.is_shooting());
        assert_eq!(Phase::default(), Phase::Idle);
    }
}
