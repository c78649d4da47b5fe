// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use crate::backends::camera::Size;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orientation of the host layout the preview is shown in
///
/// Camera preview sizes are reported sensor-relative (landscape). A portrait
/// layout shows them rotated, so the aspect ratio pushed to the view is swapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutOrientation {
    /// Phone held upright (default)
    #[default]
    Portrait,
    /// Phone held sideways, or a desktop window
    Landscape,
}

/// Saved-state key holding the active camera id
pub const SIS_CAMERA_ID: &str = "SIS_CAMERA_ID";

/// Frames observed while waiting for AF or AE before capturing anyway
pub const DEFAULT_CONVERGENCE_FRAME_LIMIT: u32 = 60;

/// Buffers held by the still-image sink; the newest image wins
pub const IMAGE_SINK_CAPACITY: usize = 1;

/// Buffered events per host event channel before slow subscribers lag
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Time allowed for the platform to acknowledge a session or device close
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Largest preview stream requested from the camera
pub const MAX_PREVIEW_SIZE: Size = Size::new(1920, 1080);

/// Two sizes share an aspect ratio when their ratios differ by less than this
pub const ASPECT_RATIO_TOLERANCE: f64 = 0.01;

/// Folder under the user's pictures directory where photos land
pub const DEFAULT_SAVE_FOLDER: &str = "stillcam";

/// File name of the photo written by the controller
pub const DEFAULT_PHOTO_FILE: &str = "photo.jpg";

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}
