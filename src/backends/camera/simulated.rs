// SPDX-License-Identifier: GPL-3.0-only

//! Simulated camera platform
//!
//! An in-process camera stack with a real frame clock (a tokio task per
//! session) and scriptable 3A behaviour. Used by the CLI and by the tests.
//!
//! - AF locks a fixed number of frames after an AF trigger
//! - AE converges a fixed number of frames after a precapture trigger
//! - Still requests targeting an image sink produce a JPEG into that sink
//! - Opening, configuring and capturing can be made to fail
//!
//! Every resource acquisition and release is recorded in a [`TraceEvent`]
//! log, so callers can check ordering and leaks.
//!
//! Callbacks are invoked synchronously from the calling thread or from the
//! frame clock task, never while an internal lock is held.

use super::{
    AeMode, AeState, AfMode, AfState, AwbMode, CameraCharacteristics, CameraDevice,
    CameraPlatform, CaptureCallback, CaptureEvent, CaptureFailure, CaptureRequest,
    CaptureRequestBuilder, CaptureSession, DeviceCallback, DeviceEvent, Image, ImageFormat,
    ImageAvailableListener, ImageSink, LensFacing, RequestTemplate, SessionCallback, SessionEvent,
    Size, Surface, SurfaceTexture, TotalCaptureResult, Trigger,
};
use crate::errors::{CameraError, CameraResult};
use crate::utils::lock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

fn next_surface() -> Surface {
    Surface::new(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed))
}

/// One camera exposed by the simulated platform
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedCamera {
    pub id: String,
    pub characteristics: CameraCharacteristics,
}

impl SimulatedCamera {
    /// Rear main camera with continuous AF and flash
    pub fn back(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            characteristics: CameraCharacteristics {
                lens_facing: LensFacing::Back,
                minimum_focus_distance: Some(10.0),
                af_available_modes: vec![
                    AfMode::Off,
                    AfMode::Auto,
                    AfMode::Macro,
                    AfMode::ContinuousVideo,
                    AfMode::ContinuousPicture,
                ],
                ae_available_modes: vec![AeMode::Off, AeMode::On, AeMode::OnAutoFlash],
                awb_available_modes: vec![AwbMode::Off, AwbMode::Auto, AwbMode::Daylight],
                preview_sizes: vec![
                    Size::new(3840, 2160),
                    Size::new(1920, 1080),
                    Size::new(1440, 1080),
                    Size::new(1280, 720),
                    Size::new(640, 480),
                ],
                jpeg_sizes: vec![
                    Size::new(4032, 3024),
                    Size::new(4000, 2250),
                    Size::new(1920, 1080),
                    Size::new(640, 480),
                ],
                sensor_orientation: 90,
            },
        }
    }

    /// Selfie camera: fixed focus, no flash
    pub fn front(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            characteristics: CameraCharacteristics {
                lens_facing: LensFacing::Front,
                minimum_focus_distance: Some(0.0),
                af_available_modes: vec![AfMode::Off],
                ae_available_modes: vec![AeMode::Off, AeMode::On],
                awb_available_modes: vec![AwbMode::Off, AwbMode::Auto],
                preview_sizes: vec![
                    Size::new(1920, 1080),
                    Size::new(1280, 720),
                    Size::new(640, 480),
                ],
                jpeg_sizes: vec![Size::new(3264, 2448), Size::new(3264, 1836)],
                sensor_orientation: 270,
            },
        }
    }

    /// Same camera with a lens that cannot focus
    pub fn fixed_focus(mut self) -> Self {
        self.characteristics.minimum_focus_distance = None;
        self.characteristics.af_available_modes = vec![AfMode::Off];
        self
    }
}

/// How the platform fails to open a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenFailure {
    /// `open` itself returns an access error
    AccessDenied,
    /// Device reports a disconnect instead of opening
    Disconnected,
    /// Device reports an error code instead of opening
    Error(i32),
}

/// Behaviour knobs, read at the moment each operation happens
#[derive(Debug, Clone)]
pub struct SimulationScript {
    /// Time between sensor frames
    pub frame_interval: Duration,
    /// Frames after an AF trigger until focus locks; `None` never locks
    pub af_lock_after: Option<u64>,
    /// Frames after a precapture trigger until exposure converges; `None` never converges
    pub ae_converge_after: Option<u64>,
    /// Whether results carry AF/AE state at all
    pub report_3a_state: bool,
    /// Bytes written for each still; a test-pattern JPEG when unset
    pub jpeg_payload: Option<Vec<u8>>,
    pub open_failure: Option<OpenFailure>,
    pub fail_configure: bool,
    pub fail_still_capture: bool,
}

impl Default for SimulationScript {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(33),
            af_lock_after: Some(3),
            ae_converge_after: Some(5),
            report_3a_state: true,
            jpeg_payload: None,
            open_failure: None,
            fail_configure: false,
            fail_still_capture: false,
        }
    }
}

impl SimulationScript {
    /// Default behaviour with a 2 ms frame clock
    pub fn fast() -> Self {
        Self {
            frame_interval: Duration::from_millis(2),
            ..Self::default()
        }
    }
}

/// Recorded platform activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    SinkCreated { surface: Surface, size: Size },
    SinkClosed { surface: Surface },
    DeviceOpened(String),
    DeviceClosed(String),
    SessionCreated(String),
    SessionClosed(String),
    RepeatingStarted,
    RepeatingStopped,
    CaptureSubmitted {
        af_trigger: Option<Trigger>,
        ae_precapture_trigger: Option<Trigger>,
        still: bool,
    },
    CaptureCompleted { frame_number: u64, still: bool },
    CaptureFailed { frame_number: u64 },
    CapturesAborted,
    ImageProduced { surface: Surface, bytes: usize },
}

impl TraceEvent {
    /// Acquisition or release of a device, session or sink
    pub fn is_resource_event(&self) -> bool {
        matches!(
            self,
            TraceEvent::SinkCreated { .. }
                | TraceEvent::SinkClosed { .. }
                | TraceEvent::DeviceOpened(_)
                | TraceEvent::DeviceClosed(_)
                | TraceEvent::SessionCreated(_)
                | TraceEvent::SessionClosed(_)
        )
    }
}

/// Resources acquired and not yet released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenResources {
    pub devices: usize,
    pub sessions: usize,
    pub sinks: usize,
}

impl OpenResources {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

struct PlatformInner {
    cameras: Vec<SimulatedCamera>,
    script: Mutex<SimulationScript>,
    trace: Mutex<Vec<TraceEvent>>,
    devices: Mutex<Vec<Weak<SimDevice>>>,
    sinks: Mutex<Vec<Weak<SimImageSink>>>,
}

impl PlatformInner {
    fn record(&self, event: TraceEvent) {
        debug!(?event, "Simulated platform");
        lock(&self.trace).push(event);
    }

    fn script(&self) -> SimulationScript {
        lock(&self.script).clone()
    }

    fn camera(&self, camera_id: &str) -> CameraResult<&SimulatedCamera> {
        self.cameras
            .iter()
            .find(|camera| camera.id == camera_id)
            .ok_or_else(|| CameraError::Platform(format!("unknown camera id {camera_id}")))
    }

    fn live_sinks(&self) -> Vec<Arc<SimImageSink>> {
        let mut sinks = lock(&self.sinks);
        sinks.retain(|sink| sink.strong_count() > 0);
        sinks.iter().filter_map(Weak::upgrade).collect()
    }
}

/// Cheap to clone; clones share cameras, script and trace
#[derive(Clone)]
pub struct SimulatedPlatform {
    inner: Arc<PlatformInner>,
}

impl Default for SimulatedPlatform {
    /// Back camera "0" and front camera "1"
    fn default() -> Self {
        Self::new(vec![SimulatedCamera::back("0"), SimulatedCamera::front("1")])
    }
}

impl SimulatedPlatform {
    pub fn new(cameras: Vec<SimulatedCamera>) -> Self {
        Self {
            inner: Arc::new(PlatformInner {
                cameras,
                script: Mutex::new(SimulationScript::default()),
                trace: Mutex::new(Vec::new()),
                devices: Mutex::new(Vec::new()),
                sinks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn with_script(self, script: SimulationScript) -> Self {
        *lock(&self.inner.script) = script;
        self
    }

    /// Change behaviour for operations that happen from now on
    pub fn update_script(&self, update: impl FnOnce(&mut SimulationScript)) {
        update(&mut lock(&self.inner.script));
    }

    pub fn cameras(&self) -> &[SimulatedCamera] {
        &self.inner.cameras
    }

    pub fn trace(&self) -> Vec<TraceEvent> {
        lock(&self.inner.trace).clone()
    }

    pub fn clear_trace(&self) {
        lock(&self.inner.trace).clear();
    }

    /// Count of acquisitions minus releases, per resource kind
    pub fn open_resources(&self) -> OpenResources {
        let mut open = OpenResources::default();
        for event in lock(&self.inner.trace).iter() {
            match event {
                TraceEvent::DeviceOpened(_) => open.devices += 1,
                TraceEvent::DeviceClosed(_) => open.devices = open.devices.saturating_sub(1),
                TraceEvent::SessionCreated(_) => open.sessions += 1,
                TraceEvent::SessionClosed(_) => open.sessions = open.sessions.saturating_sub(1),
                TraceEvent::SinkCreated { .. } => open.sinks += 1,
                TraceEvent::SinkClosed { .. } => open.sinks = open.sinks.saturating_sub(1),
                _ => {}
            }
        }
        open
    }

    /// Whether the sink behind `surface` currently has a listener
    pub fn has_image_listener(&self, surface: Surface) -> bool {
        self.inner
            .live_sinks()
            .iter()
            .any(|sink| sink.surface == surface && lock(&sink.listener).is_some())
    }

    /// Drop an image straight into the sink behind `surface`
    ///
    /// Returns false when no open sink owns the surface.
    pub fn push_image(&self, surface: Surface, data: Vec<u8>) -> bool {
        let Some(sink) = self
            .inner
            .live_sinks()
            .into_iter()
            .find(|sink| sink.surface == surface && !sink.closed.load(Ordering::SeqCst))
        else {
            return false;
        };
        self.inner.record(TraceEvent::ImageProduced {
            surface,
            bytes: data.len(),
        });
        sink.push(Image {
            format: sink.format,
            size: sink.size,
            timestamp_ns: 0,
            data: data.into(),
        });
        true
    }

    /// Make an open device report a disconnect, as if it were unplugged
    ///
    /// Returns false when the camera is not open.
    pub fn disconnect(&self, camera_id: &str) -> bool {
        let device = lock(&self.inner.devices)
            .iter()
            .filter_map(Weak::upgrade)
            .find(|device| device.id == camera_id && !device.closed.load(Ordering::SeqCst));
        match device {
            Some(device) => {
                warn!(camera_id, "Simulating camera disconnect");
                (device.callback)(DeviceEvent::Disconnected);
                true
            }
            None => false,
        }
    }
}

impl CameraPlatform for SimulatedPlatform {
    fn list_cameras(&self) -> CameraResult<Vec<String>> {
        Ok(self
            .inner
            .cameras
            .iter()
            .map(|camera| camera.id.clone())
            .collect())
    }

    fn characteristics(&self, camera_id: &str) -> CameraResult<CameraCharacteristics> {
        Ok(self.inner.camera(camera_id)?.characteristics.clone())
    }

    fn open(&self, camera_id: &str, callback: DeviceCallback) -> CameraResult<()> {
        let camera = self.inner.camera(camera_id)?;

        match self.inner.script().open_failure {
            Some(OpenFailure::AccessDenied) => {
                return Err(CameraError::AccessDenied(format!(
                    "camera {camera_id} blocked by policy"
                )));
            }
            Some(OpenFailure::Disconnected) => {
                callback(DeviceEvent::Disconnected);
                return Ok(());
            }
            Some(OpenFailure::Error(code)) => {
                callback(DeviceEvent::Error(code));
                return Ok(());
            }
            None => {}
        }

        let device = Arc::new(SimDevice {
            id: camera.id.clone(),
            inner: Arc::clone(&self.inner),
            callback,
            closed: AtomicBool::new(false),
            session: Mutex::new(None),
        });
        lock(&self.inner.devices).push(Arc::downgrade(&device));
        self.inner.record(TraceEvent::DeviceOpened(camera.id.clone()));

        let handle: Arc<dyn CameraDevice> = device.clone();
        (device.callback)(DeviceEvent::Opened(handle));
        Ok(())
    }

    fn make_image_sink(
        &self,
        size: Size,
        format: ImageFormat,
        capacity: usize,
    ) -> CameraResult<Arc<dyn ImageSink>> {
        if capacity == 0 {
            return Err(CameraError::Platform(
                "image sink needs room for at least one image".to_string(),
            ));
        }

        let sink = Arc::new(SimImageSink {
            surface: next_surface(),
            size,
            format,
            capacity,
            inner: Arc::clone(&self.inner),
            queue: Mutex::new(VecDeque::new()),
            listener: Mutex::new(None),
            closed: AtomicBool::new(false),
        });
        lock(&self.inner.sinks).push(Arc::downgrade(&sink));
        self.inner.record(TraceEvent::SinkCreated {
            surface: sink.surface,
            size,
        });
        Ok(sink)
    }
}

struct SimDevice {
    id: String,
    inner: Arc<PlatformInner>,
    callback: DeviceCallback,
    closed: AtomicBool,
    session: Mutex<Option<Arc<SimSession>>>,
}

impl SimDevice {
    fn ensure_open(&self) -> CameraResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CameraError::Closed)
        } else {
            Ok(())
        }
    }
}

impl CameraDevice for SimDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn create_capture_request(
        &self,
        template: RequestTemplate,
    ) -> CameraResult<CaptureRequestBuilder> {
        self.ensure_open()?;
        Ok(CaptureRequestBuilder::new(template))
    }

    fn create_capture_session(
        &self,
        outputs: Vec<Surface>,
        callback: SessionCallback,
    ) -> CameraResult<()> {
        self.ensure_open()?;

        let previous = lock(&self.session).take();
        if let Some(previous) = previous {
            previous.close();
        }

        if self.inner.script().fail_configure {
            callback(SessionEvent::ConfigureFailed);
            return Ok(());
        }

        let session = SimSession::start(self.id.clone(), Arc::clone(&self.inner), outputs, callback);
        *lock(&self.session) = Some(Arc::clone(&session));

        let handle: Arc<dyn CaptureSession> = session.clone();
        (session.callback)(SessionEvent::Configured(handle));
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let session = lock(&self.session).take();
        if let Some(session) = session {
            session.close();
        }
        self.inner.record(TraceEvent::DeviceClosed(self.id.clone()));
        (self.callback)(DeviceEvent::Closed);
    }
}

#[derive(Default)]
struct SessionRuntime {
    frame_number: u64,
    sequence: u64,
    repeating: Option<(CaptureRequest, CaptureCallback)>,
    pending: VecDeque<(CaptureRequest, CaptureCallback)>,
    af_trigger_frame: Option<u64>,
    ae_trigger_frame: Option<u64>,
}

impl SessionRuntime {
    fn af_state(&self, frame: u64, request: &CaptureRequest, script: &SimulationScript) -> AfState {
        match request.af_mode {
            None | Some(AfMode::Off) => AfState::Inactive,
            Some(_) => match (self.af_trigger_frame, script.af_lock_after) {
                (Some(start), Some(after)) if frame - start >= after => AfState::FocusedLocked,
                (Some(_), _) => AfState::ActiveScan,
                (None, _) => AfState::PassiveScan,
            },
        }
    }

    fn ae_state(&self, frame: u64, request: &CaptureRequest, script: &SimulationScript) -> AeState {
        match request.ae_mode {
            None | Some(AeMode::Off) => AeState::Inactive,
            Some(_) => match (self.ae_trigger_frame, script.ae_converge_after) {
                (Some(start), Some(after)) if frame - start >= after => AeState::Converged,
                (Some(_), _) => AeState::Precapture,
                (None, _) => AeState::Searching,
            },
        }
    }
}

struct SimSession {
    device_id: String,
    inner: Arc<PlatformInner>,
    outputs: Vec<Surface>,
    callback: SessionCallback,
    closed: AtomicBool,
    runtime: Mutex<SessionRuntime>,
    clock: Mutex<Option<JoinHandle<()>>>,
}

impl SimSession {
    fn start(
        device_id: String,
        inner: Arc<PlatformInner>,
        outputs: Vec<Surface>,
        callback: SessionCallback,
    ) -> Arc<Self> {
        let frame_interval = inner.script().frame_interval;
        let session = Arc::new(Self {
            device_id,
            inner,
            outputs,
            callback,
            closed: AtomicBool::new(false),
            runtime: Mutex::new(SessionRuntime::default()),
            clock: Mutex::new(None),
        });
        session
            .inner
            .record(TraceEvent::SessionCreated(session.device_id.clone()));

        let weak = Arc::downgrade(&session);
        let clock = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(frame_interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if !session.tick() {
                    break;
                }
            }
        });
        *lock(&session.clock) = Some(clock);
        session
    }

    fn ensure_open(&self) -> CameraResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(CameraError::Closed)
        } else {
            Ok(())
        }
    }

    fn ensure_targets(&self, request: &CaptureRequest) -> CameraResult<()> {
        match request
            .targets
            .iter()
            .find(|target| !self.outputs.contains(*target))
        {
            Some(target) => Err(CameraError::Platform(format!(
                "surface {} is not an output of this session",
                target.id()
            ))),
            None if request.targets.is_empty() => Err(CameraError::Platform(
                "capture request has no target surface".to_string(),
            )),
            None => Ok(()),
        }
    }

    fn targets_sink(&self, request: &CaptureRequest) -> bool {
        self.inner
            .live_sinks()
            .iter()
            .any(|sink| request.targets(sink.surface))
    }

    /// Process one sensor frame; false once the session is closed
    fn tick(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        let script = self.inner.script();

        let (request, callback, frame_number, one_shot, af_state, ae_state) = {
            let mut runtime = lock(&self.runtime);
            let (request, callback, one_shot) = match runtime.pending.pop_front() {
                Some((request, callback)) => (request, callback, true),
                None => match runtime.repeating.clone() {
                    Some((request, callback)) => (request, callback, false),
                    None => return true,
                },
            };

            runtime.frame_number += 1;
            let frame_number = runtime.frame_number;
            match request.af_trigger {
                Some(Trigger::Start) => runtime.af_trigger_frame = Some(frame_number),
                Some(Trigger::Cancel) => runtime.af_trigger_frame = None,
                _ => {}
            }
            match request.ae_precapture_trigger {
                Some(Trigger::Start) => runtime.ae_trigger_frame = Some(frame_number),
                Some(Trigger::Cancel) => runtime.ae_trigger_frame = None,
                _ => {}
            }

            let af_state = script
                .report_3a_state
                .then(|| runtime.af_state(frame_number, &request, &script));
            let ae_state = script
                .report_3a_state
                .then(|| runtime.ae_state(frame_number, &request, &script));
            (request, callback, frame_number, one_shot, af_state, ae_state)
        };

        let still = self.targets_sink(&request);
        if still && script.fail_still_capture {
            self.inner.record(TraceEvent::CaptureFailed { frame_number });
            callback(CaptureEvent::Failed(CaptureFailure {
                frame_number,
                reason: "simulated sensor readout failure".to_string(),
            }));
            return true;
        }

        if one_shot {
            self.inner.record(TraceEvent::CaptureCompleted {
                frame_number,
                still,
            });
        }
        let targets = request.targets.clone();
        callback(CaptureEvent::Completed(TotalCaptureResult {
            frame_number,
            request,
            af_state,
            ae_state,
        }));

        if still {
            // Locks release once the still is exposed
            {
                let mut runtime = lock(&self.runtime);
                runtime.af_trigger_frame = None;
                runtime.ae_trigger_frame = None;
            }
            self.deliver_still(&targets, frame_number, &script);
        }
        true
    }

    fn deliver_still(&self, targets: &[Surface], frame_number: u64, script: &SimulationScript) {
        for sink in self.inner.live_sinks() {
            if !targets.contains(&sink.surface) {
                continue;
            }
            let data = match &script.jpeg_payload {
                Some(payload) => payload.clone(),
                None => test_pattern_jpeg(sink.size),
            };
            self.inner.record(TraceEvent::ImageProduced {
                surface: sink.surface,
                bytes: data.len(),
            });
            sink.push(Image {
                format: sink.format,
                size: sink.size,
                timestamp_ns: frame_number * script.frame_interval.as_nanos() as u64,
                data: data.into(),
            });
        }
    }
}

impl CaptureSession for SimSession {
    fn set_repeating_request(
        &self,
        request: CaptureRequest,
        callback: CaptureCallback,
    ) -> CameraResult<u64> {
        self.ensure_open()?;
        self.ensure_targets(&request)?;
        let sequence = {
            let mut runtime = lock(&self.runtime);
            runtime.sequence += 1;
            runtime.repeating = Some((request, callback));
            runtime.sequence
        };
        self.inner.record(TraceEvent::RepeatingStarted);
        Ok(sequence)
    }

    fn stop_repeating(&self) -> CameraResult<()> {
        self.ensure_open()?;
        let stopped = lock(&self.runtime).repeating.take();
        if stopped.is_some() {
            self.inner.record(TraceEvent::RepeatingStopped);
        }
        Ok(())
    }

    fn capture(&self, request: CaptureRequest, callback: CaptureCallback) -> CameraResult<u64> {
        self.ensure_open()?;
        self.ensure_targets(&request)?;
        self.inner.record(TraceEvent::CaptureSubmitted {
            af_trigger: request.af_trigger,
            ae_precapture_trigger: request.ae_precapture_trigger,
            still: self.targets_sink(&request),
        });
        let mut runtime = lock(&self.runtime);
        runtime.sequence += 1;
        runtime.pending.push_back((request, callback));
        Ok(runtime.sequence)
    }

    fn abort_captures(&self) -> CameraResult<()> {
        self.ensure_open()?;
        let aborted = std::mem::take(&mut lock(&self.runtime).pending);
        if !aborted.is_empty() {
            self.inner.record(TraceEvent::CapturesAborted);
        }
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let clock = lock(&self.clock).take();
        if let Some(clock) = clock {
            clock.abort();
        }
        // Dropping the callbacks ends every result stream of this session
        let released = {
            let mut runtime = lock(&self.runtime);
            (runtime.repeating.take(), std::mem::take(&mut runtime.pending))
        };
        drop(released);

        self.inner
            .record(TraceEvent::SessionClosed(self.device_id.clone()));
        (self.callback)(SessionEvent::Closed);
    }
}

struct SimImageSink {
    surface: Surface,
    size: Size,
    format: ImageFormat,
    capacity: usize,
    inner: Arc<PlatformInner>,
    queue: Mutex<VecDeque<Image>>,
    listener: Mutex<Option<ImageAvailableListener>>,
    closed: AtomicBool,
}

impl SimImageSink {
    fn push(&self, image: Image) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        {
            let mut queue = lock(&self.queue);
            queue.push_back(image);
            while queue.len() > self.capacity {
                queue.pop_front();
                debug!(surface = self.surface.id(), "Image sink full, dropped oldest image");
            }
        }
        let listener = lock(&self.listener).clone();
        if let Some(listener) = listener {
            listener();
        }
    }
}

impl ImageSink for SimImageSink {
    fn surface(&self) -> Surface {
        self.surface
    }

    fn size(&self) -> Size {
        self.size
    }

    fn set_on_image_available(&self, listener: Option<ImageAvailableListener>) {
        if self.closed.load(Ordering::SeqCst) {
            return;
        }
        *lock(&self.listener) = listener;
    }

    fn acquire_latest_image(&self) -> Option<Image> {
        let mut queue = lock(&self.queue);
        let latest = queue.pop_back();
        queue.clear();
        latest
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let listener = lock(&self.listener).take();
        drop(listener);
        lock(&self.queue).clear();
        self.inner.record(TraceEvent::SinkClosed {
            surface: self.surface,
        });
    }
}

/// Preview texture standing in for a host view
pub struct SimulatedSurfaceTexture {
    surface: Surface,
    buffer_size: Mutex<Option<Size>>,
}

impl SimulatedSurfaceTexture {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            surface: next_surface(),
            buffer_size: Mutex::new(None),
        })
    }

    /// Size last set by the controller
    pub fn buffer_size(&self) -> Option<Size> {
        *lock(&self.buffer_size)
    }
}

impl SurfaceTexture for SimulatedSurfaceTexture {
    fn set_default_buffer_size(&self, size: Size) {
        *lock(&self.buffer_size) = Some(size);
    }

    fn create_surface(&self) -> Surface {
        self.surface
    }
}

/// Small gradient JPEG standing in for sensor output
fn test_pattern_jpeg(size: Size) -> Vec<u8> {
    // Encode a thumbnail; the full sensor size would only slow the clock down
    let width = size.width.clamp(1, 64);
    let height = size.height.clamp(1, 48);
    let pattern = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 4) as u8, (y * 5) as u8, 128])
    });

    let mut encoded = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, 85);
    match encoder.encode_image(&pattern) {
        Ok(()) => encoded,
        Err(error) => {
            warn!(%error, "Test pattern encoding failed, emitting empty JPEG");
            vec![0xFF, 0xD8, 0xFF, 0xD9]
        }
    }
}
