// SPDX-License-Identifier: GPL-3.0-only

//! Photo session stages
//!
//! Each stage takes the [`SessionState`] being built up, performs one platform
//! step and records what it acquired:
//!
//! ```text
//! init_state → init_image_sink → open_device → create_session → start_preview
//!                                        shutter → AF wait → AE wait → capture_still
//! close_session → close_device → close_image_sink
//! ```
//!
//! Stages that open something also hand back the stream that keeps it open.
//! Dropping that stream releases the resource, so a cancelled stage never
//! leaks a device or session.

pub mod controls;
pub mod convergence;
pub mod saver;

pub use controls::{RequestControls, jpeg_orientation};
pub use convergence::{ConvergenceOutcome, wait_for_ae, wait_for_af};
pub use saver::{ImageSaver, SinkSubscription};

use crate::backends::camera::adapter::{
    self, DeviceStream, DeviceUpdate, PreviewStream, SessionStream, SessionUpdate,
};
use crate::backends::camera::{
    CameraDevice, CameraPlatform, CaptureEvent, CaptureSession, DisplayRotation, ImageFormat,
    ImageSink, Size, Surface, SurfaceTexture, TotalCaptureResult, Trigger,
};
use crate::constants::IMAGE_SINK_CAPACITY;
use crate::errors::{CameraError, CameraResult};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Everything one camera session has acquired so far
///
/// Owned by a single orchestration task. Resources are released in the
/// reverse order they were acquired: session, device, then image sink.
pub struct SessionState {
    pub camera_id: String,
    pub platform: Arc<dyn CameraPlatform>,
    pub surface_texture: Arc<dyn SurfaceTexture>,
    pub preview_surface: Surface,
    pub image_sink: Option<Arc<dyn ImageSink>>,
    pub camera_device: Option<Arc<dyn CameraDevice>>,
    pub capture_session: Option<Arc<dyn CaptureSession>>,
    /// Latest result from any request on this session
    pub result: Option<TotalCaptureResult>,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("camera_id", &self.camera_id)
            .field("preview_surface", &self.preview_surface)
            .field("image_sink", &self.image_sink.as_ref().map(|sink| sink.surface()))
            .field("camera_device", &self.camera_device.is_some())
            .field("capture_session", &self.capture_session.is_some())
            .field(
                "frame_number",
                &self.result.as_ref().map(|result| result.frame_number),
            )
            .finish()
    }
}

impl SessionState {
    fn session(&self) -> CameraResult<Arc<dyn CaptureSession>> {
        self.capture_session.clone().ok_or(CameraError::Closed)
    }

    fn device(&self) -> CameraResult<Arc<dyn CameraDevice>> {
        self.camera_device.clone().ok_or(CameraError::Closed)
    }

    fn sink_surface(&self) -> CameraResult<Surface> {
        self.image_sink
            .as_ref()
            .map(|sink| sink.surface())
            .ok_or(CameraError::Closed)
    }
}

/// Fresh state for one camera, with the preview texture sized for the stream
pub fn init_state(
    platform: Arc<dyn CameraPlatform>,
    camera_id: String,
    surface_texture: Arc<dyn SurfaceTexture>,
    preview_size: Size,
) -> SessionState {
    surface_texture.set_default_buffer_size(preview_size);
    let preview_surface = surface_texture.create_surface();
    debug!(camera_id = %camera_id, preview = %preview_size, "Session state initialized");

    SessionState {
        camera_id,
        platform,
        surface_texture,
        preview_surface,
        image_sink: None,
        camera_device: None,
        capture_session: None,
        result: None,
    }
}

/// Create the JPEG sink for stills and start saving what lands in it
pub fn init_image_sink(
    state: &mut SessionState,
    still_size: Size,
    saver: ImageSaver,
) -> CameraResult<SinkSubscription> {
    let sink = state
        .platform
        .make_image_sink(still_size, ImageFormat::Jpeg, IMAGE_SINK_CAPACITY)?;
    debug!(size = %still_size, surface = sink.surface().id(), "Image sink created");

    state.image_sink = Some(Arc::clone(&sink));
    Ok(saver.subscribe(sink))
}

/// Open the state's camera and wait until the device is usable
pub async fn open_device(state: &mut SessionState) -> CameraResult<DeviceStream> {
    let mut updates = adapter::open_device(Arc::clone(&state.platform), state.camera_id.clone());
    match updates.next().await {
        Some(Ok(DeviceUpdate::Opened(device))) => {
            state.camera_device = Some(device);
            Ok(updates)
        }
        Some(Ok(DeviceUpdate::Closed)) | None => Err(CameraError::Closed),
        Some(Err(error)) => Err(error),
    }
}

/// Configure a session with the preview surface and the image sink as outputs
pub async fn create_session(state: &mut SessionState) -> CameraResult<SessionStream> {
    let device = state.device()?;
    let outputs = vec![state.preview_surface, state.sink_surface()?];

    let mut updates = adapter::create_capture_session(device, outputs);
    match updates.next().await {
        Some(Ok(SessionUpdate::Configured(session))) => {
            state.capture_session = Some(session);
            Ok(updates)
        }
        Some(Ok(SessionUpdate::Closed)) | None => Err(CameraError::Closed),
        Some(Err(error)) => Err(error),
    }
}

/// Start the repeating preview request and wait for its first frame
pub async fn start_preview(
    state: &mut SessionState,
    controls: &RequestControls,
) -> CameraResult<PreviewStream> {
    let session = state.session()?;
    let device = state.device()?;
    let request = controls
        .preview_builder(device.as_ref(), state.preview_surface)?
        .build();

    let mut preview = adapter::set_repeating_request(session, request);
    let first = preview.next().await.ok_or(CameraError::Closed)??;
    debug!(frame = first.frame_number, "First preview frame");
    state.result = Some(first);
    Ok(preview)
}

/// Capture one still into the image sink
pub async fn capture_still(
    state: &mut SessionState,
    controls: &RequestControls,
    rotation: DisplayRotation,
) -> CameraResult<()> {
    let session = state.session()?;
    let device = state.device()?;
    let request = controls
        .still_builder(device.as_ref(), state.sink_surface()?, rotation)?
        .build();
    let orientation = request.jpeg_orientation;

    let result = adapter::capture(session, request).await?;
    info!(
        frame = result.frame_number,
        jpeg_orientation = ?orientation,
        "Still capture completed"
    );
    state.result = Some(result);
    Ok(())
}

/// Release any AF lock or precapture sequence left by an interrupted shot
///
/// Best effort: the request is fired without waiting for its result.
pub fn cancel_triggers(state: &SessionState, controls: &RequestControls) {
    let (Ok(session), Ok(device)) = (state.session(), state.device()) else {
        return;
    };
    let mut builder = match controls.preview_builder(device.as_ref(), state.preview_surface) {
        Ok(builder) => builder,
        Err(error) => {
            debug!(%error, "Cannot build trigger cancel request");
            return;
        }
    };
    if !controls.is_fixed_focus() {
        builder.set_af_trigger(Trigger::Cancel);
    }
    builder.set_ae_precapture_trigger(Trigger::Cancel);

    match session.capture(builder.build(), Arc::new(|_: CaptureEvent| {})) {
        Ok(_) => debug!("Submitted 3A trigger cancel"),
        Err(error) => debug!(%error, "3A trigger cancel rejected"),
    }
}

/// Close the capture session and wait for the platform to confirm
pub async fn close_session(
    state: &mut SessionState,
    updates: Option<SessionStream>,
    timeout: Duration,
) {
    state.result = None;
    let Some(session) = state.capture_session.take() else {
        return;
    };
    session.close();
    await_closed(updates, |update| matches!(update, SessionUpdate::Closed), timeout, "session").await;
    info!(camera_id = %state.camera_id, "Capture session closed");
}

/// Close the camera device and wait for the platform to confirm
pub async fn close_device(
    state: &mut SessionState,
    updates: Option<DeviceStream>,
    timeout: Duration,
) {
    let Some(device) = state.camera_device.take() else {
        return;
    };
    device.close();
    await_closed(updates, |update| matches!(update, DeviceUpdate::Closed), timeout, "device").await;
    info!(camera_id = %state.camera_id, "Camera device closed");
}

/// Close the image sink and stop saving from it
pub fn close_image_sink(state: &mut SessionState, subscription: Option<SinkSubscription>) {
    drop(subscription);
    if let Some(sink) = state.image_sink.take() {
        sink.close();
        debug!(surface = sink.surface().id(), "Image sink closed");
    }
}

async fn await_closed<T>(
    updates: Option<BoxStream<'static, CameraResult<T>>>,
    is_closed: fn(&T) -> bool,
    timeout: Duration,
    resource: &str,
) {
    let Some(mut updates) = updates else {
        return;
    };
    let closed = async {
        while let Some(update) = updates.next().await {
            match update {
                Ok(update) if is_closed(&update) => return,
                Ok(_) => {}
                Err(error) => {
                    debug!(%error, resource, "Error while waiting for close");
                    return;
                }
            }
        }
    };
    if tokio::time::timeout(timeout, closed).await.is_err() {
        warn!(resource, ?timeout, "Close was not acknowledged in time");
    }
}
