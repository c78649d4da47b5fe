// SPDX-License-Identifier: GPL-3.0-only

//! The orchestration task
//!
//! One task per subscription drives the photo pipeline through the [`Phase`]
//! state machine. It owns every stream that keeps a platform resource open,
//! so dropping the task (or any in-flight stage) releases them in reverse
//! order of acquisition.
//!
//! Host events reach the task through the [`EventBus`]:
//!
//! - `surface_available` starts a session on that texture
//! - `shutter` runs AF wait, AE wait and the still capture
//! - `switch_camera` tears down and restarts on the next camera, reusing the
//!   texture the view still holds
//! - `pause` tears down and ends the task
//! - `surface_destroyed` tears down and waits for the next texture; textures
//!   queued before the loss are skipped

use super::callbacks::{HostDispatcher, PreviewView};
use super::events::{EventBus, EventSubscription};
use super::state::{CameraSelection, Phase};
use crate::backends::camera::adapter::{
    DeviceStream, DeviceUpdate, PreviewStream, SessionStream, SessionUpdate,
};
use crate::backends::camera::{
    CameraPlatform, DisplayRotation, SurfaceTexture, TotalCaptureResult, strategy,
};
use crate::config::ControllerConfig;
use crate::errors::{CameraError, CameraResult};
use crate::pipelines::photo::{
    self, ImageSaver, RequestControls, SessionState, SinkSubscription, wait_for_ae, wait_for_af,
};
use crate::utils::lock;
use futures::StreamExt;
use futures::future::{BoxFuture, Fuse, FutureExt};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Everything the controller shares with its orchestration tasks
#[derive(Clone)]
pub(crate) struct PipelineContext {
    pub platform: Arc<dyn CameraPlatform>,
    pub config: Arc<ControllerConfig>,
    pub view: Arc<dyn PreviewView>,
    pub host: HostDispatcher,
    pub bus: EventBus,
    /// Camera the next session opens; only changed while no session is live
    pub selection: Arc<Mutex<Option<CameraSelection>>>,
    /// Texture the host last made available
    pub texture: Arc<Mutex<Option<Arc<dyn SurfaceTexture>>>>,
    pub phase: Arc<watch::Sender<Phase>>,
}

impl PipelineContext {
    pub fn set_phase(&self, phase: Phase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            debug!(?previous, ?phase, "Phase changed");
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn selection(&self) -> Option<CameraSelection> {
        lock(&self.selection).clone()
    }
}

type OneShot = Fuse<BoxFuture<'static, Option<()>>>;

fn one_shot(subscription: EventSubscription<()>) -> OneShot {
    subscription.first().boxed().fuse()
}

/// Subscriptions for one orchestration task
///
/// Created synchronously by the controller before the task is spawned, so no
/// event emitted after `on_resume` returns is missed.
pub(crate) struct Inbox {
    surface_available: EventSubscription<Arc<dyn SurfaceTexture>>,
    shutter: EventSubscription<()>,
    interrupts: Interrupts,
}

impl Inbox {
    pub fn subscribe(bus: &EventBus) -> Self {
        Self {
            surface_available: bus.surface_available.subscribe(),
            shutter: bus.shutter.subscribe(),
            interrupts: Interrupts {
                pause: one_shot(bus.pause.subscribe()),
                surface_destroyed: bus.surface_destroyed.subscribe(),
                switch_camera: one_shot(bus.switch_camera.subscribe()),
            },
        }
    }

    fn rearm_switch(&mut self, bus: &EventBus) {
        self.interrupts.switch_camera = one_shot(bus.switch_camera.subscribe());
    }
}

/// Why a live session has to stop
#[derive(Debug)]
enum Interrupt {
    Pause,
    SurfaceLost,
    Switch,
    Failed(CameraError),
}

/// Events that end a live session
struct Interrupts {
    pause: OneShot,
    surface_destroyed: EventSubscription<()>,
    switch_camera: OneShot,
}

impl Interrupts {
    /// Wait for the next reason to stop
    ///
    /// `lifecycle` watches the device and session streams for loss; `switch`
    /// enables the switch-camera event.
    async fn next(
        &mut self,
        failures: &mut mpsc::UnboundedReceiver<CameraError>,
        lifecycle: Option<(&mut Option<DeviceStream>, &mut Option<SessionStream>)>,
        switch: bool,
    ) -> Interrupt {
        let (device, session) = match lifecycle {
            Some((device, session)) => (Some(device), Some(session)),
            None => (None, None),
        };

        tokio::select! {
            biased;
            _ = &mut self.pause => Interrupt::Pause,
            destroyed = self.surface_destroyed.next() => match destroyed {
                Some(()) => Interrupt::SurfaceLost,
                None => Interrupt::Pause,
            },
            error = device_lost(device) => Interrupt::Failed(error),
            error = session_lost(session) => Interrupt::Failed(error),
            Some(error) = failures.recv() => Interrupt::Failed(error),
            requested = &mut self.switch_camera, if switch => match requested {
                Some(()) => Interrupt::Switch,
                None => Interrupt::Pause,
            },
        }
    }
}

async fn device_lost(device: Option<&mut Option<DeviceStream>>) -> CameraError {
    let Some(Some(updates)) = device else {
        return std::future::pending().await;
    };
    loop {
        match updates.next().await {
            Some(Ok(DeviceUpdate::Opened(_))) => {}
            Some(Ok(DeviceUpdate::Closed)) | None => return CameraError::Closed,
            Some(Err(error)) => return error,
        }
    }
}

async fn session_lost(session: Option<&mut Option<SessionStream>>) -> CameraError {
    let Some(Some(updates)) = session else {
        return std::future::pending().await;
    };
    loop {
        match updates.next().await {
            Some(Ok(SessionUpdate::Configured(_))) => {}
            Some(Ok(SessionUpdate::Closed)) | None => return CameraError::Closed,
            Some(Err(error)) => return error,
        }
    }
}

/// Next preview frame, or never when the preview is not running
async fn next_frame(
    preview: &mut Option<PreviewStream>,
) -> Option<CameraResult<TotalCaptureResult>> {
    match preview {
        Some(frames) => frames.next().await,
        None => std::future::pending().await,
    }
}

/// Streams holding the session's platform resources open
///
/// Fields drop in declaration order, the reverse of acquisition.
#[derive(Default)]
struct Streams {
    preview: Option<PreviewStream>,
    session: Option<SessionStream>,
    device: Option<DeviceStream>,
    sink: Option<SinkSubscription>,
}

struct LiveSession {
    streams: Streams,
    state: SessionState,
    selection: CameraSelection,
    controls: RequestControls,
    failures: mpsc::UnboundedReceiver<CameraError>,
}

enum SessionExit {
    Paused,
    SurfaceLost,
    Restarted,
    Failed,
}

pub(crate) struct Orchestrator {
    ctx: PipelineContext,
    inbox: Inbox,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext, inbox: Inbox) -> Self {
        Self { ctx, inbox }
    }

    /// Serve sessions until paused or failed
    pub async fn run(mut self) {
        let mut restart = false;
        loop {
            self.ctx.set_phase(Phase::Idle);
            let held = if restart {
                lock(&self.ctx.texture).clone()
            } else {
                None
            };
            restart = false;

            let texture = match held {
                Some(texture) => texture,
                None => tokio::select! {
                    biased;
                    _ = &mut self.inbox.interrupts.pause => {
                        info!("Paused while idle");
                        return;
                    }
                    destroyed = self.inbox.interrupts.surface_destroyed.next() => {
                        if destroyed.is_none() {
                            return;
                        }
                        continue;
                    }
                    texture = self.inbox.surface_available.next() => match texture {
                        Some(texture) if self.is_current(&texture) => texture,
                        Some(_) => {
                            debug!("Skipping a texture the view no longer holds");
                            continue;
                        }
                        None => return,
                    },
                },
            };

            match self.run_session(texture).await {
                SessionExit::Paused => {
                    self.ctx.set_phase(Phase::Idle);
                    return;
                }
                SessionExit::SurfaceLost => {}
                SessionExit::Restarted => restart = true,
                SessionExit::Failed => return,
            }
        }
    }

    /// Whether `texture` is the one the view currently holds
    fn is_current(&self, texture: &Arc<dyn SurfaceTexture>) -> bool {
        lock(&self.ctx.texture)
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, texture))
    }

    async fn run_session(&mut self, texture: Arc<dyn SurfaceTexture>) -> SessionExit {
        let Some(selection) = self.ctx.selection() else {
            return self.fail(CameraError::NoCameraFound);
        };
        info!(camera_id = %selection.camera_id, "Starting camera session");

        let (failures_sender, failures) = mpsc::unbounded_channel();
        let state = photo::init_state(
            Arc::clone(&self.ctx.platform),
            selection.camera_id.clone(),
            texture,
            selection.preview_size,
        );
        let mut live = LiveSession {
            streams: Streams::default(),
            state,
            controls: RequestControls::new(Arc::clone(&selection.characteristics)),
            selection,
            failures,
        };

        let opened = tokio::select! {
            biased;
            interrupt = self.inbox.interrupts.next(&mut live.failures, None, false) => {
                Err(interrupt)
            }
            result = open_pipeline(
                &self.ctx,
                &mut live.state,
                &mut live.streams,
                &live.selection,
                &live.controls,
                failures_sender,
            ) => result.map_err(Interrupt::Failed),
        };

        let interrupt = match opened {
            Ok(()) => preview_loop(&self.ctx, &mut self.inbox, &mut live).await,
            Err(interrupt) => interrupt,
        };
        self.finish(&mut live, interrupt).await
    }

    async fn finish(&mut self, live: &mut LiveSession, interrupt: Interrupt) -> SessionExit {
        let camera_id = live.selection.camera_id.clone();
        match interrupt {
            Interrupt::Pause => {
                info!(camera_id = %camera_id, "Pausing camera");
                teardown(&self.ctx, live).await;
                SessionExit::Paused
            }
            Interrupt::SurfaceLost => {
                info!(camera_id = %camera_id, "Preview surface destroyed");
                teardown(&self.ctx, live).await;
                SessionExit::SurfaceLost
            }
            Interrupt::Switch => {
                teardown(&self.ctx, live).await;
                if let Err(error) = self.select_next_camera(&camera_id) {
                    return self.fail(error);
                }
                self.inbox.rearm_switch(&self.ctx.bus);
                SessionExit::Restarted
            }
            Interrupt::Failed(error) => {
                warn!(camera_id = %camera_id, %error, "Camera session failed, tearing down");
                teardown(&self.ctx, live).await;
                self.fail(error)
            }
        }
    }

    fn select_next_camera(&self, current: &str) -> CameraResult<()> {
        let platform = self.ctx.platform.as_ref();
        let next = strategy::switch_camera(platform, current)?;
        info!(from = current, to = %next, "Switching camera");

        let selection = CameraSelection::resolve(platform, next, &self.ctx.config)?;
        selection.push_aspect_ratio(self.ctx.view.as_ref(), self.ctx.config.layout);
        *lock(&self.ctx.selection) = Some(selection);
        Ok(())
    }

    fn fail(&self, error: CameraError) -> SessionExit {
        self.ctx.set_phase(Phase::Failed);
        self.ctx.host.report(error);
        SessionExit::Failed
    }
}

/// Sink, device, session and preview, in that order
async fn open_pipeline(
    ctx: &PipelineContext,
    state: &mut SessionState,
    streams: &mut Streams,
    selection: &CameraSelection,
    controls: &RequestControls,
    failures: mpsc::UnboundedSender<CameraError>,
) -> CameraResult<()> {
    ctx.set_phase(Phase::Opening);
    let saver = ImageSaver::new(
        ctx.config.photo_path.clone(),
        selection.characteristics.lens_facing,
        ctx.host.clone(),
        failures,
    );
    streams.sink = Some(photo::init_image_sink(state, selection.still_size, saver)?);
    streams.device = Some(photo::open_device(state).await?);
    info!(camera_id = %state.camera_id, "Camera opened");

    ctx.set_phase(Phase::SessionOpening);
    streams.session = Some(photo::create_session(state).await?);
    info!(camera_id = %state.camera_id, "Capture session configured");

    streams.preview = Some(photo::start_preview(state, controls).await?);
    ctx.set_phase(Phase::Previewing);
    info!(
        camera_id = %state.camera_id,
        preview = %selection.preview_size,
        "Preview started"
    );
    Ok(())
}

async fn preview_loop(
    ctx: &PipelineContext,
    inbox: &mut Inbox,
    live: &mut LiveSession,
) -> Interrupt {
    loop {
        tokio::select! {
            biased;
            interrupt = inbox.interrupts.next(
                &mut live.failures,
                Some((&mut live.streams.device, &mut live.streams.session)),
                true,
            ) => return interrupt,
            shutter = inbox.shutter.next() => {
                if shutter.is_none() {
                    return Interrupt::Pause;
                }
                if let Some(interrupt) = shoot(ctx, &mut inbox.interrupts, live).await {
                    return interrupt;
                }
            }
            frame = next_frame(&mut live.streams.preview) => match frame {
                Some(Ok(result)) => live.state.result = Some(result),
                Some(Err(error)) => return Interrupt::Failed(error),
                None => {
                    debug!("Preview stream ended");
                    live.streams.preview = None;
                }
            },
        }
    }
}

/// One shutter press; `None` means the session is previewing again
///
/// Switch requests wait until the shot is done. An interrupted AF or AE wait
/// leaves a CANCEL trigger behind so no lock outlives it.
async fn shoot(
    ctx: &PipelineContext,
    interrupts: &mut Interrupts,
    live: &mut LiveSession,
) -> Option<Interrupt> {
    let rotation = ctx.view.display_rotation();
    debug!(?rotation, "Shutter pressed");

    let outcome = tokio::select! {
        biased;
        interrupt = interrupts.next(
            &mut live.failures,
            Some((&mut live.streams.device, &mut live.streams.session)),
            false,
        ) => Err(interrupt),
        result = take_picture(
            ctx,
            &mut live.state,
            &mut live.streams.preview,
            &live.controls,
            rotation,
        ) => Ok(result),
    };

    match outcome {
        Ok(Ok(())) => {
            ctx.set_phase(Phase::Previewing);
            None
        }
        Ok(Err(error)) => Some(Interrupt::Failed(error)),
        Err(interrupt) => {
            if matches!(ctx.phase(), Phase::AfWait | Phase::AeWait) {
                photo::cancel_triggers(&live.state, &live.controls);
            }
            Some(interrupt)
        }
    }
}

async fn take_picture(
    ctx: &PipelineContext,
    state: &mut SessionState,
    preview: &mut Option<PreviewStream>,
    controls: &RequestControls,
    rotation: DisplayRotation,
) -> CameraResult<()> {
    ctx.set_phase(Phase::AfWait);
    let af = wait_for_af(state, preview, controls, ctx.config.af_frame_limit).await?;
    ctx.set_phase(Phase::AeWait);
    let ae = wait_for_ae(state, preview, controls, ctx.config.ae_frame_limit).await?;
    debug!(?af, ?ae, "3A ready");

    ctx.set_phase(Phase::Capturing);
    photo::capture_still(state, controls, rotation).await
}

/// Close session, device, then sink, waiting for each close to be confirmed
async fn teardown(ctx: &PipelineContext, live: &mut LiveSession) {
    let timeout = ctx.config.close_timeout();
    live.streams.preview = None;

    ctx.set_phase(Phase::ClosingSession);
    photo::close_session(&mut live.state, live.streams.session.take(), timeout).await;

    ctx.set_phase(Phase::ClosingDevice);
    photo::close_device(&mut live.state, live.streams.device.take(), timeout).await;

    ctx.set_phase(Phase::ClosingSink);
    photo::close_image_sink(&mut live.state, live.streams.sink.take());
}
