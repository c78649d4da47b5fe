// SPDX-License-Identifier: GPL-3.0-only

//! Camera platform abstraction
//!
//! The controller never talks to camera hardware directly. It drives a
//! callback-style platform through the traits below, which are shaped after a
//! phone camera stack: a manager opens devices, a device creates one capture
//! session over a fixed set of output surfaces, and the session runs repeating
//! (preview) and one-shot requests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Orchestrator (FSM) │
//! └──────────┬──────────┘
//!            │ streams
//!            ▼
//! ┌─────────────────────┐
//! │  adapter            │  ← callbacks → cancellable streams
//! └──────────┬──────────┘
//!            │ callbacks
//!            ▼
//! ┌─────────────────────┐
//! │  CameraPlatform     │  ← devices, sessions, image sinks
//! └──────────┬──────────┘
//!            │
//!       ┌─────────┐
//!       │simulated│  ← deterministic in-process platform
//!       └─────────┘
//! ```
//!
//! Callbacks may fire on any thread and must not block; the adapter only
//! forwards them into channels.

pub mod adapter;
pub mod request;
pub mod simulated;
pub mod strategy;
pub mod types;

pub use request::*;
pub use types::*;

use crate::errors::CameraResult;
use std::sync::Arc;

/// Lifecycle notifications for a camera device
pub enum DeviceEvent {
    /// Device is ready for session creation
    Opened(Arc<dyn CameraDevice>),
    /// Device is no longer available
    Disconnected,
    /// Device hit a fatal error (platform error code)
    Error(i32),
    /// Device finished closing
    Closed,
}

/// Lifecycle notifications for a capture session
pub enum SessionEvent {
    /// Session is ready to accept requests
    Configured(Arc<dyn CaptureSession>),
    /// Requested outputs could not be configured
    ConfigureFailed,
    /// Session finished closing
    Closed,
}

/// Per-request outcome
pub enum CaptureEvent {
    Completed(TotalCaptureResult),
    Failed(CaptureFailure),
}

pub type DeviceCallback = Arc<dyn Fn(DeviceEvent) + Send + Sync>;
pub type SessionCallback = Arc<dyn Fn(SessionEvent) + Send + Sync>;
pub type CaptureCallback = Arc<dyn Fn(CaptureEvent) + Send + Sync>;
pub type ImageAvailableListener = Arc<dyn Fn() + Send + Sync>;

/// Entry point to the camera service
pub trait CameraPlatform: Send + Sync {
    /// Ids of all cameras, in platform order
    fn list_cameras(&self) -> CameraResult<Vec<String>>;

    /// Static description of one camera
    fn characteristics(&self, camera_id: &str) -> CameraResult<CameraCharacteristics>;

    /// Start opening a camera
    ///
    /// The outcome arrives through `callback`: `Opened` once, then `Closed`
    /// after [`CameraDevice::close`], or `Disconnected`/`Error` at any time.
    ///
    /// # Returns
    /// * `Ok(())` - Open request accepted
    /// * `Err(CameraError::AccessDenied)` - Caller may not use the camera service
    fn open(&self, camera_id: &str, callback: DeviceCallback) -> CameraResult<()>;

    /// Create a buffer queue that receives images of one size and format
    ///
    /// # Arguments
    /// * `size` - Image dimensions
    /// * `format` - Pixel format produced into the sink
    /// * `capacity` - Buffers held before older ones are discarded
    fn make_image_sink(
        &self,
        size: Size,
        format: ImageFormat,
        capacity: usize,
    ) -> CameraResult<Arc<dyn ImageSink>>;
}

/// An opened camera
pub trait CameraDevice: Send + Sync {
    fn id(&self) -> &str;

    /// Builder pre-filled with the template's defaults
    fn create_capture_request(&self, template: RequestTemplate)
    -> CameraResult<CaptureRequestBuilder>;

    /// Configure a session over `outputs`; the result arrives through `callback`
    ///
    /// Creating a session closes the device's previous session, if any.
    fn create_capture_session(
        &self,
        outputs: Vec<Surface>,
        callback: SessionCallback,
    ) -> CameraResult<()>;

    /// Release the device; `DeviceEvent::Closed` follows. Idempotent.
    fn close(&self);
}

/// A configured capture session
pub trait CaptureSession: Send + Sync {
    /// Replace the repeating request; returns the sequence id
    ///
    /// The previous repeating request's callback receives no further events.
    fn set_repeating_request(
        &self,
        request: CaptureRequest,
        callback: CaptureCallback,
    ) -> CameraResult<u64>;

    fn stop_repeating(&self) -> CameraResult<()>;

    /// Queue a single request; it runs ahead of the repeating request
    fn capture(&self, request: CaptureRequest, callback: CaptureCallback) -> CameraResult<u64>;

    /// Discard queued single requests that have not started
    fn abort_captures(&self) -> CameraResult<()>;

    /// Release the session; `SessionEvent::Closed` follows. Idempotent.
    fn close(&self);
}

/// A bounded buffer queue receiving images from the camera
pub trait ImageSink: Send + Sync {
    /// Surface requests target to deliver into this sink
    fn surface(&self) -> Surface;

    fn size(&self) -> Size;

    /// Register (or clear) the listener called once per produced image
    fn set_on_image_available(&self, listener: Option<ImageAvailableListener>);

    /// Newest queued image; older queued images are discarded
    fn acquire_latest_image(&self) -> Option<Image>;

    /// Release buffers and drop the listener. Idempotent.
    fn close(&self);
}

/// Host-owned texture the preview is rendered into
pub trait SurfaceTexture: Send + Sync {
    /// Size of the buffers the camera renders into
    fn set_default_buffer_size(&self, size: Size);

    /// Producer-side surface for capture requests
    fn create_surface(&self) -> Surface;
}
