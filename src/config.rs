// SPDX-License-Identifier: GPL-3.0-only

//! Controller configuration, persisted as JSON

use crate::backends::camera::Size;
use crate::constants::{
    DEFAULT_CLOSE_TIMEOUT, DEFAULT_CONVERGENCE_FRAME_LIMIT, DEFAULT_PHOTO_FILE,
    DEFAULT_SAVE_FOLDER, LayoutOrientation, MAX_PREVIEW_SIZE,
};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Config file name under the user's config directory
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Where the captured JPEG is written (overwritten per shot)
    pub photo_path: PathBuf,
    /// Layout orientation used to orient the preview aspect ratio
    pub layout: LayoutOrientation,
    /// Frames to wait for AF convergence before capturing anyway
    pub af_frame_limit: u32,
    /// Frames to wait for AE convergence before capturing anyway
    pub ae_frame_limit: u32,
    /// Milliseconds to wait for a close acknowledgement during teardown
    pub close_timeout_ms: u64,
    /// Upper bound for the preview stream size
    pub max_preview: Size,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            photo_path: default_photo_path(),
            layout: LayoutOrientation::default(),
            af_frame_limit: DEFAULT_CONVERGENCE_FRAME_LIMIT,
            ae_frame_limit: DEFAULT_CONVERGENCE_FRAME_LIMIT,
            close_timeout_ms: DEFAULT_CLOSE_TIMEOUT.as_millis() as u64,
            max_preview: MAX_PREVIEW_SIZE,
        }
    }
}

impl ControllerConfig {
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// Read a config file; a missing file or missing fields take the defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let config = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Config from the user's config directory, or defaults
    ///
    /// An unreadable file is logged and ignored.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => config,
            Err(error) => {
                warn!(%error, "Ignoring unreadable config, using defaults");
                Self::default()
            }
        }
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_error)
    }

    /// `<config dir>/stillcam/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(DEFAULT_SAVE_FOLDER).join(CONFIG_FILE))
    }
}

/// `<pictures>/stillcam/photo.jpg`, falling back to the home directory and
/// then the working directory
pub fn default_photo_path() -> PathBuf {
    dirs::picture_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_SAVE_FOLDER)
        .join(DEFAULT_PHOTO_FILE)
}
