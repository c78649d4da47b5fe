// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture controller

use crate::controller::ControllerCallback;
use thiserror::Error;

/// Result type alias using CameraError
pub type CameraResult<T> = Result<T, CameraError>;

/// Why the platform refused or lost a camera device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum OpenFailureReason {
    /// Device went away (unplugged, or taken by a higher-priority client)
    #[error("camera disconnected")]
    Disconnected,
    /// Another client holds the device
    #[error("camera is in use by another client")]
    InUse,
    /// System-wide limit of simultaneously open cameras reached
    #[error("too many cameras open")]
    MaxCamerasInUse,
    /// Disabled by device policy
    #[error("camera disabled by policy")]
    Disabled,
    /// Fatal device error
    #[error("fatal camera device error (code {0})")]
    Device(i32),
    /// Fatal camera service error
    #[error("fatal camera service error (code {0})")]
    Service(i32),
}

impl OpenFailureReason {
    /// Map a platform device error code to a reason
    ///
    /// Codes: 1 in use, 2 max cameras in use, 3 disabled, 4 device, 5 service.
    /// Unknown codes are treated as fatal device errors.
    pub fn from_error_code(code: i32) -> Self {
        match code {
            1 => Self::InUse,
            2 => Self::MaxCamerasInUse,
            3 => Self::Disabled,
            5 => Self::Service(code),
            _ => Self::Device(code),
        }
    }
}

/// Errors raised anywhere in the capture pipeline
#[derive(Debug, Error)]
pub enum CameraError {
    /// Platform denied access to the camera service
    #[error("camera access denied: {0}")]
    AccessDenied(String),
    /// Device could not be opened, or failed after opening
    #[error("failed to open camera: {0}")]
    Open(OpenFailureReason),
    /// Platform lists no usable camera
    #[error("can't find any camera")]
    NoCameraFound,
    /// Capture session could not be configured with the requested outputs
    #[error("capture session configuration failed: {0}")]
    ConfigureFailed(String),
    /// A submitted capture did not produce a result
    #[error("capture failed at frame {frame_number}: {reason}")]
    CaptureFailed { frame_number: u64, reason: String },
    /// Writing the photo failed
    #[error("failed to save photo: {0}")]
    Io(#[from] std::io::Error),
    /// Any other platform-reported failure
    #[error("camera platform error: {0}")]
    Platform(String),
    /// Device, session or sink was closed underneath an operation
    #[error("camera resource closed")]
    Closed,
}

impl CameraError {
    /// Route the error to the matching host callback
    pub fn report_to(&self, callback: &dyn ControllerCallback) {
        match self {
            CameraError::AccessDenied(_) => callback.on_camera_access_exception(),
            CameraError::Open(reason) => callback.on_camera_open_exception(*reason),
            other => callback.on_exception(other),
        }
    }
}

/// Errors while loading or saving JSON files (configuration, saved state)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
