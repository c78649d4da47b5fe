// SPDX-License-Identifier: GPL-3.0-only

//! Stillcam - still photo capture over a callback-driven camera platform
//!
//! This library drives a phone-style camera stack (devices, capture sessions,
//! repeating and one-shot requests, image sinks) from a host UI: it opens the
//! chosen camera when the preview texture appears, keeps the preview running,
//! and on each shutter press waits for auto-focus and auto-exposure before
//! capturing a JPEG and saving it.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`controller`]: Host-facing API, event bus and the orchestration task
//! - [`pipelines`]: Photo session stages, 3A requests and convergence waits
//! - [`backends`]: Camera platform traits, callback adapters and a simulated platform
//! - [`config`]: Controller configuration
//! - [`storage`]: Writing captured images to disk
//!
//! # Example
//!
//! ```ignore
//! let controller = CameraController::new(platform, callback, view, ControllerConfig::default());
//! controller.on_create(None);
//! controller.on_resume();
//! controller.surface_texture_available(texture, 1920, 1080);
//! controller.take_photo();
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod controller;
pub mod errors;
pub mod pipelines;
pub mod storage;
pub(crate) mod utils;

// Re-export commonly used types
pub use config::ControllerConfig;
pub use controller::{Bundle, CameraController, ControllerCallback, Phase, PreviewView};
pub use errors::{CameraError, CameraResult, OpenFailureReason};
