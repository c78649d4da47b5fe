// SPDX-License-Identifier: GPL-3.0-only

//! Callback-to-stream adapter
//!
//! Every platform operation that reports through callbacks is exposed as a
//! cold stream (or future): nothing happens until it is first polled, and
//! dropping it before the platform finished releases whatever was acquired.
//!
//! | operation                 | yields                       | on drop               |
//! |---------------------------|------------------------------|-----------------------|
//! | [`open_device`]           | `Opened`, then `Closed`      | device closed         |
//! | [`create_capture_session`]| `Configured`, then `Closed`  | session closed        |
//! | [`set_repeating_request`] | one result per frame         | repeating stopped     |
//! | [`capture`]               | the single result            | queued captures aborted |
//! | [`on_image_available`]    | the sink, once per image     | listener removed      |
//!
//! At most one repeating stream per session may be alive: drop the previous
//! one before installing the next.

use super::{
    CameraDevice, CameraPlatform, CaptureEvent, CaptureRequest, CaptureSession, DeviceEvent,
    ImageSink, SessionEvent, Surface, TotalCaptureResult,
};
use crate::errors::{CameraError, CameraResult, OpenFailureReason};
use async_stream::{stream, try_stream};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Device lifecycle as seen by the pipeline
pub enum DeviceUpdate {
    Opened(Arc<dyn CameraDevice>),
    Closed,
}

/// Session lifecycle as seen by the pipeline
pub enum SessionUpdate {
    Configured(Arc<dyn CaptureSession>),
    Closed,
}

pub type DeviceStream = BoxStream<'static, CameraResult<DeviceUpdate>>;
pub type SessionStream = BoxStream<'static, CameraResult<SessionUpdate>>;
pub type PreviewStream = BoxStream<'static, CameraResult<TotalCaptureResult>>;
pub type ImageAvailableStream = BoxStream<'static, Arc<dyn ImageSink>>;

/// Open a camera
///
/// Errors: `Open(Disconnected)` / `Open(<code reason>)` if the device fails at
/// any point, `AccessDenied` if the platform refuses the request.
pub fn open_device(platform: Arc<dyn CameraPlatform>, camera_id: String) -> DeviceStream {
    device_updates(platform, camera_id).boxed()
}

/// Configure a session over `outputs`
pub fn create_capture_session(
    device: Arc<dyn CameraDevice>,
    outputs: Vec<Surface>,
) -> SessionStream {
    session_updates(device, outputs).boxed()
}

/// Install `request` as the session's repeating request and stream its results
///
/// Per-frame failures are logged and skipped. The stream ends when the
/// platform stops delivering results (request replaced or session closed).
pub fn set_repeating_request(
    session: Arc<dyn CaptureSession>,
    request: CaptureRequest,
) -> PreviewStream {
    repeating_results(session, request).boxed()
}

/// Submit a single request and wait for its result
pub async fn capture(
    session: Arc<dyn CaptureSession>,
    request: CaptureRequest,
) -> CameraResult<TotalCaptureResult> {
    let (sender, mut receiver) = mpsc::unbounded_channel();
    session.capture(
        request,
        Arc::new(move |event: CaptureEvent| {
            let _ = sender.send(event);
        }),
    )?;

    let mut pending = OnCancel::new({
        let session = Arc::clone(&session);
        move || {
            if let Err(error) = session.abort_captures() {
                debug!(%error, "Aborting pending capture failed");
            }
        }
    });
    let event = receiver.recv().await;
    pending.disarm();

    match event {
        Some(CaptureEvent::Completed(result)) => Ok(result),
        Some(CaptureEvent::Failed(failure)) => Err(CameraError::CaptureFailed {
            frame_number: failure.frame_number,
            reason: failure.reason,
        }),
        None => Err(CameraError::Closed),
    }
}

/// Stream the sink every time an image lands in it
pub fn on_image_available(sink: Arc<dyn ImageSink>) -> ImageAvailableStream {
    let images = stream! {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        sink.set_on_image_available(Some(Arc::new(move || {
            let _ = sender.send(());
        })));
        let _listener = OnCancel::new({
            let sink = Arc::clone(&sink);
            move || sink.set_on_image_available(None)
        });

        while receiver.recv().await.is_some() {
            yield Arc::clone(&sink);
        }
    };
    images.boxed()
}

fn device_updates(
    platform: Arc<dyn CameraPlatform>,
    camera_id: String,
) -> impl Stream<Item = CameraResult<DeviceUpdate>> + Send + 'static {
    try_stream! {
        let (sender, receiver) = mpsc::unbounded_channel();
        platform.open(&camera_id, Arc::new(move |event: DeviceEvent| {
            let _ = sender.send(event);
        }))?;
        let mut events = DeviceEvents { receiver, device: None };

        while let Some(event) = events.receiver.recv().await {
            match event {
                DeviceEvent::Opened(device) => {
                    debug!(camera_id = %device.id(), "Device opened");
                    events.device = Some(Arc::clone(&device));
                    yield DeviceUpdate::Opened(device);
                }
                DeviceEvent::Disconnected => {
                    events.close_device();
                    Err::<(), _>(CameraError::Open(OpenFailureReason::Disconnected))?;
                }
                DeviceEvent::Error(code) => {
                    events.close_device();
                    let reason = OpenFailureReason::from_error_code(code);
                    Err::<(), _>(CameraError::Open(reason))?;
                }
                DeviceEvent::Closed => {
                    events.device = None;
                    yield DeviceUpdate::Closed;
                    break;
                }
            }
        }
    }
}

fn session_updates(
    device: Arc<dyn CameraDevice>,
    outputs: Vec<Surface>,
) -> impl Stream<Item = CameraResult<SessionUpdate>> + Send + 'static {
    try_stream! {
        let (sender, receiver) = mpsc::unbounded_channel();
        let output_count = outputs.len();
        device.create_capture_session(outputs, Arc::new(move |event: SessionEvent| {
            let _ = sender.send(event);
        }))?;
        let mut events = SessionEvents { receiver, session: None };

        while let Some(event) = events.receiver.recv().await {
            match event {
                SessionEvent::Configured(session) => {
                    events.session = Some(Arc::clone(&session));
                    yield SessionUpdate::Configured(session);
                }
                SessionEvent::ConfigureFailed => {
                    let reason = format!("camera {} rejected {output_count} outputs", device.id());
                    Err::<(), _>(CameraError::ConfigureFailed(reason))?;
                }
                SessionEvent::Closed => {
                    events.session = None;
                    yield SessionUpdate::Closed;
                    break;
                }
            }
        }
    }
}

fn repeating_results(
    session: Arc<dyn CaptureSession>,
    request: CaptureRequest,
) -> impl Stream<Item = CameraResult<TotalCaptureResult>> + Send + 'static {
    try_stream! {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        session.set_repeating_request(request, Arc::new(move |event: CaptureEvent| {
            let _ = sender.send(event);
        }))?;
        let mut repeating = OnCancel::new({
            let session = Arc::clone(&session);
            move || {
                if let Err(error) = session.stop_repeating() {
                    debug!(%error, "Stopping repeating request failed");
                }
            }
        });

        while let Some(event) = receiver.recv().await {
            match event {
                CaptureEvent::Completed(result) => yield result,
                CaptureEvent::Failed(failure) => {
                    debug!(
                        frame = failure.frame_number,
                        reason = %failure.reason,
                        "Preview frame dropped"
                    );
                }
            }
        }
        // The platform already dropped this request
        repeating.disarm();
    }
}

/// Runs an action when dropped unless disarmed
struct OnCancel<F: FnOnce()> {
    action: Option<F>,
}

impl<F: FnOnce()> OnCancel<F> {
    fn new(action: F) -> Self {
        Self {
            action: Some(action),
        }
    }

    fn disarm(&mut self) {
        self.action = None;
    }
}

impl<F: FnOnce()> Drop for OnCancel<F> {
    fn drop(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }
}

/// Device callbacks plus the device handed out so far
///
/// Dropping it closes the open device, including one whose `Opened` event is
/// still queued.
struct DeviceEvents {
    receiver: mpsc::UnboundedReceiver<DeviceEvent>,
    device: Option<Arc<dyn CameraDevice>>,
}

impl DeviceEvents {
    fn close_device(&mut self) {
        if let Some(device) = self.device.take() {
            debug!(camera_id = %device.id(), "Closing device");
            device.close();
        }
    }
}

impl Drop for DeviceEvents {
    fn drop(&mut self) {
        self.close_device();
        while let Ok(event) = self.receiver.try_recv() {
            if let DeviceEvent::Opened(device) = event {
                device.close();
            }
        }
    }
}

/// Session callbacks plus the session handed out so far
struct SessionEvents {
    receiver: mpsc::UnboundedReceiver<SessionEvent>,
    session: Option<Arc<dyn CaptureSession>>,
}

impl Drop for SessionEvents {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!("Closing capture session");
            session.close();
        }
        while let Ok(event) = self.receiver.try_recv() {
            if let SessionEvent::Configured(session) = event {
                session.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::simulated::{
        OpenFailure, SimulatedPlatform, SimulationScript, TraceEvent,
    };
    use crate::backends::camera::{CaptureRequestBuilder, ImageFormat, RequestTemplate, Size};

    fn platform() -> SimulatedPlatform {
        SimulatedPlatform::default().with_script(SimulationScript::fast())
    }

    async fn opened(platform: &SimulatedPlatform) -> (DeviceStream, Arc<dyn CameraDevice>) {
        let mut updates = open_device(Arc::new(platform.clone()), "0".to_string());
        match updates.next().await {
            Some(Ok(DeviceUpdate::Opened(device))) => (updates, device),
            _ => panic!("device did not open"),
        }
    }

    #[tokio::test]
    async fn test_dropping_device_stream_closes_device() {
        let platform = platform();
        let (updates, device) = opened(&platform).await;
        assert_eq!(device.id(), "0");
        assert_eq!(platform.open_resources().devices, 1);

        drop(updates);
        assert_eq!(platform.open_resources().devices, 0);
        assert!(
            platform
                .trace()
                .contains(&TraceEvent::DeviceClosed("0".to_string()))
        );
    }

    #[tokio::test]
    async fn test_close_yields_closed_once() {
        let platform = platform();
        let (mut updates, device) = opened(&platform).await;
        device.close();

        assert!(matches!(updates.next().await, Some(Ok(DeviceUpdate::Closed))));
        assert!(updates.next().await.is_none());
        drop(updates);

        let closes = platform
            .trace()
            .into_iter()
            .filter(|event| matches!(event, TraceEvent::DeviceClosed(_)))
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn test_disconnect_maps_to_open_error() {
        let platform = platform();
        platform.update_script(|script| script.open_failure = Some(OpenFailure::Disconnected));

        let mut updates = open_device(Arc::new(platform.clone()), "0".to_string());
        match updates.next().await {
            Some(Err(CameraError::Open(reason))) => {
                assert_eq!(reason, OpenFailureReason::Disconnected)
            }
            _ => panic!("expected disconnect error"),
        }
        assert!(updates.next().await.is_none());
    }

    #[tokio::test]
    async fn test_access_denied_surfaces_as_error() {
        let platform = platform();
        platform.update_script(|script| script.open_failure = Some(OpenFailure::AccessDenied));

        let mut updates = open_device(Arc::new(platform.clone()), "0".to_string());
        assert!(matches!(
            updates.next().await,
            Some(Err(CameraError::AccessDenied(_)))
        ));
    }

    #[tokio::test]
    async fn test_configure_failure_is_an_error() {
        let platform = platform();
        platform.update_script(|script| script.fail_configure = true);
        let (_device_updates, device) = opened(&platform).await;

        let mut sessions = create_capture_session(device, vec![Surface::new(900)]);
        assert!(matches!(
            sessions.next().await,
            Some(Err(CameraError::ConfigureFailed(_)))
        ));
    }

    #[tokio::test]
    async fn test_dropping_repeating_stream_stops_repeating() {
        let platform = platform();
        let (_device_updates, device) = opened(&platform).await;
        let surface = Surface::new(901);
        let mut sessions = create_capture_session(Arc::clone(&device), vec![surface]);
        let Some(Ok(SessionUpdate::Configured(session))) = sessions.next().await else {
            panic!("session not configured");
        };

        let mut builder = CaptureRequestBuilder::new(RequestTemplate::Preview);
        builder.add_target(surface);
        let mut preview = set_repeating_request(Arc::clone(&session), builder.build());
        let first = preview.next().await.unwrap().unwrap();
        let second = preview.next().await.unwrap().unwrap();
        assert!(second.frame_number > first.frame_number);

        drop(preview);
        assert!(platform.trace().contains(&TraceEvent::RepeatingStopped));
    }

    #[tokio::test]
    async fn test_single_capture_returns_result() {
        let platform = platform();
        let (_device_updates, device) = opened(&platform).await;
        let sink = platform
            .make_image_sink(Size::new(640, 480), ImageFormat::Jpeg, 1)
            .unwrap();
        let mut sessions = create_capture_session(Arc::clone(&device), vec![sink.surface()]);
        let Some(Ok(SessionUpdate::Configured(session))) = sessions.next().await else {
            panic!("session not configured");
        };

        let mut builder = CaptureRequestBuilder::new(RequestTemplate::StillCapture);
        builder.add_target(sink.surface());
        let result = capture(Arc::clone(&session), builder.build()).await.unwrap();
        assert!(result.frame_number > 0);
        assert!(sink.acquire_latest_image().is_some());

        platform.update_script(|script| script.fail_still_capture = true);
        let failed = capture(session, builder.build()).await;
        assert!(matches!(failed, Err(CameraError::CaptureFailed { .. })));
    }

    #[tokio::test]
    async fn test_image_stream_removes_listener_on_drop() {
        let platform = platform();
        let sink = platform
            .make_image_sink(Size::new(640, 480), ImageFormat::Jpeg, 1)
            .unwrap();
        let mut images = on_image_available(Arc::clone(&sink));

        // Listener is installed on first poll
        let poll = tokio::time::timeout(std::time::Duration::from_millis(10), images.next()).await;
        assert!(poll.is_err());
        assert!(platform.has_image_listener(sink.surface()));

        drop(images);
        assert!(!platform.has_image_listener(sink.surface()));
    }
}
