// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the camera platform abstraction

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Width divided by height, 0 for a degenerate size
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            0.0
        } else {
            f64::from(self.width) / f64::from(self.height)
        }
    }

    /// Same size rotated by 90 degrees
    pub fn transposed(&self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Whether this size fits inside `bounds` without rotation
    pub fn fits_within(&self, bounds: Size) -> bool {
        self.width <= bounds.width && self.height <= bounds.height
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Direction a lens faces relative to the device screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    /// Same side as the screen (selfie camera)
    Front,
    /// Opposite side of the screen
    #[default]
    Back,
    /// Externally attached camera
    External,
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
            LensFacing::External => write!(f, "external"),
        }
    }
}

/// Pixel format of an output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    /// Compressed still images
    Jpeg,
    /// Planar YUV frames for CPU processing
    Yuv420,
    /// Implementation-defined format consumed by a preview surface
    Private,
}

/// Overall 3A control mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Off,
    Auto,
}

/// Auto-focus mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfMode {
    Off,
    /// Single sweep on trigger
    Auto,
    Macro,
    ContinuousVideo,
    /// Continuous focusing tuned for stills; locks on trigger
    ContinuousPicture,
    Edof,
}

/// Auto-exposure mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeMode {
    Off,
    On,
    OnAutoFlash,
    OnAlwaysFlash,
    OnAutoFlashRedeye,
}

/// Auto-white-balance mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwbMode {
    Off,
    Auto,
    Incandescent,
    Fluorescent,
    Daylight,
    Cloudy,
}

/// AF trigger or AE precapture trigger value carried by a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// No trigger action
    Idle,
    /// Start the routine (AF scan, AE precapture metering)
    Start,
    /// Abort the routine and release any lock
    Cancel,
}

/// Use case hint for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureIntent {
    Preview,
    StillCapture,
    ZeroShutterLag,
}

/// Auto-focus state reported in a capture result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfState {
    Inactive,
    PassiveScan,
    PassiveFocused,
    ActiveScan,
    FocusedLocked,
    NotFocusedLocked,
    PassiveUnfocused,
}

impl AfState {
    /// Whether focusing has settled well enough to take a picture
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            AfState::FocusedLocked
                | AfState::NotFocusedLocked
                | AfState::PassiveFocused
                | AfState::PassiveUnfocused
        )
    }
}

/// Auto-exposure state reported in a capture result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AeState {
    Inactive,
    Searching,
    Converged,
    Locked,
    FlashRequired,
    Precapture,
}

impl AeState {
    /// Whether exposure has settled well enough to take a picture
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            AeState::Converged | AeState::FlashRequired | AeState::Locked
        )
    }
}

/// Rotation of the display relative to its natural orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayRotation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl DisplayRotation {
    pub fn degrees(self) -> u32 {
        match self {
            DisplayRotation::Rotation0 => 0,
            DisplayRotation::Rotation90 => 90,
            DisplayRotation::Rotation180 => 180,
            DisplayRotation::Rotation270 => 270,
        }
    }

    /// Nearest rotation for an angle in degrees (any multiple of 90 works)
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            45..135 => DisplayRotation::Rotation90,
            135..225 => DisplayRotation::Rotation180,
            225..315 => DisplayRotation::Rotation270,
            _ => DisplayRotation::Rotation0,
        }
    }
}

/// Immutable description of one camera
#[derive(Debug, Clone, PartialEq)]
pub struct CameraCharacteristics {
    pub lens_facing: LensFacing,
    /// Closest focus distance in diopters; `None` or zero means fixed focus
    pub minimum_focus_distance: Option<f32>,
    pub af_available_modes: Vec<AfMode>,
    pub ae_available_modes: Vec<AeMode>,
    pub awb_available_modes: Vec<AwbMode>,
    /// Sizes a preview surface can be configured with
    pub preview_sizes: Vec<Size>,
    /// Sizes the JPEG encoder can produce
    pub jpeg_sizes: Vec<Size>,
    /// Clockwise rotation of the sensor image relative to the device's natural orientation
    pub sensor_orientation: u32,
}

impl CameraCharacteristics {
    /// Whether the lens cannot focus (no AF routine to wait for)
    pub fn is_fixed_focus(&self) -> bool {
        !matches!(self.minimum_focus_distance, Some(distance) if distance > 0.0)
    }

    /// Output sizes available for a format
    pub fn output_sizes(&self, format: ImageFormat) -> &[Size] {
        match format {
            ImageFormat::Jpeg => &self.jpeg_sizes,
            ImageFormat::Private => &self.preview_sizes,
            ImageFormat::Yuv420 => &[],
        }
    }
}

/// Opaque handle to a buffer queue that requests can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Surface {
    id: u64,
}

impl Surface {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A buffer acquired from an image sink
#[derive(Clone)]
pub struct Image {
    pub format: ImageFormat,
    pub size: Size,
    /// Sensor timestamp of the exposure start
    pub timestamp_ns: u64,
    pub data: Arc<[u8]>,
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("format", &self.format)
            .field("size", &self.size)
            .field("timestamp_ns", &self.timestamp_ns)
            .field("data", &format_args!("{} bytes", self.data.len()))
            .finish()
    }
}
