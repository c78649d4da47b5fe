// SPDX-License-Identifier: GPL-3.0-only

//! Host-facing camera controller
//!
//! The controller turns host calls (lifecycle hooks, view events, buttons)
//! into events on an [`events::EventBus`]. A spawned orchestration task reacts
//! to them and reports back through [`ControllerCallback`].
//!
//! # Lifecycle
//!
//! ```text
//! on_create ──▶ on_resume ──▶ surface_texture_available ──▶ previewing
//!                   ▲                                           │
//!                   └──────────────── on_pause ◀────────────────┘
//! ```
//!
//! `on_resume` subscribes a fresh orchestration task; `on_pause` lets it tear
//! down and end. After a failure the task has ended too, and the next
//! `on_resume` starts over.

pub mod callbacks;
pub mod events;
pub mod orchestrator;
pub mod state;

pub use callbacks::{ControllerCallback, HostDispatcher, HostEvent, PreviewView};
pub use events::{EventBus, EventChannel, EventSubscription};
pub use state::{Bundle, CameraSelection, Phase};

use crate::backends::camera::{CameraPlatform, Size, SurfaceTexture, strategy};
use crate::config::ControllerConfig;
use crate::constants::SIS_CAMERA_ID;
use crate::errors::{CameraError, CameraResult};
use crate::utils::lock;
use orchestrator::{Inbox, Orchestrator, PipelineContext};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Drives one camera for a host UI
///
/// Must be created inside a tokio runtime; host callbacks are delivered on a
/// task of that runtime.
pub struct CameraController {
    ctx: PipelineContext,
    subscription: Mutex<Option<JoinHandle<()>>>,
}

impl CameraController {
    pub fn new(
        platform: Arc<dyn CameraPlatform>,
        callback: Arc<dyn ControllerCallback>,
        view: Arc<dyn PreviewView>,
        config: ControllerConfig,
    ) -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        let ctx = PipelineContext {
            platform,
            config: Arc::new(config),
            view,
            host: HostDispatcher::spawn(callback),
            bus: EventBus::new(),
            selection: Arc::new(Mutex::new(None)),
            texture: Arc::new(Mutex::new(None)),
            phase: Arc::new(phase),
        };

        Self {
            ctx,
            subscription: Mutex::new(None),
        }
    }

    /// Request a still
    ///
    /// Dropped when no orchestration task is subscribed. Otherwise it is
    /// queued and fires once a preview is running, after any shot in progress.
    pub fn take_photo(&self) {
        let phase = self.ctx.phase();
        if phase.is_shooting() {
            debug!(?phase, "Shutter pressed during a shot, queued");
        }
        self.ctx.bus.shutter.emit(());
    }

    /// Switch to the next camera once the preview is running
    pub fn switch_camera(&self) {
        self.ctx.bus.switch_camera.emit(());
    }

    /// The view's texture is ready at `width`x`height`
    pub fn surface_texture_available(
        &self,
        texture: Arc<dyn SurfaceTexture>,
        width: u32,
        height: u32,
    ) {
        debug!(size = %Size::new(width, height), "Surface texture available");
        *lock(&self.ctx.texture) = Some(Arc::clone(&texture));
        self.ctx.bus.surface_available.emit(texture);
    }

    /// The view's texture is gone; returns true as the texture may be released
    pub fn surface_texture_destroyed(&self) -> bool {
        debug!("Surface texture destroyed");
        lock(&self.ctx.texture).take();
        self.ctx.bus.surface_destroyed.emit(());
        true
    }

    /// Restore the camera id from `saved_state`, or choose the default camera
    pub fn on_create(&self, saved_state: Option<&Bundle>) {
        let restored = saved_state
            .and_then(|bundle| bundle.get_string(SIS_CAMERA_ID))
            .map(str::to_string);
        if let Err(error) = self.select_camera(restored) {
            self.ctx.host.report(error);
        }
    }

    fn select_camera(&self, restored: Option<String>) -> CameraResult<()> {
        let platform = self.ctx.platform.as_ref();
        let camera_id = match restored {
            Some(camera_id) => {
                info!(camera_id = %camera_id, "Restoring camera");
                camera_id
            }
            None => strategy::choose_default_camera(platform)?.ok_or(CameraError::NoCameraFound)?,
        };

        let selection = CameraSelection::resolve(platform, camera_id, &self.ctx.config)?;
        selection.push_aspect_ratio(self.ctx.view.as_ref(), self.ctx.config.layout);
        *lock(&self.ctx.selection) = Some(selection);
        Ok(())
    }

    pub fn on_start(&self) {}

    /// Subscribe a fresh orchestration task
    ///
    /// A texture the view already made available is handed to it right away.
    pub fn on_resume(&self) {
        self.unsubscribe();

        let inbox = Inbox::subscribe(&self.ctx.bus);
        let task = tokio::spawn(Orchestrator::new(self.ctx.clone(), inbox).run());
        *lock(&self.subscription) = Some(task);
        info!("Camera controller resumed");

        let texture = lock(&self.ctx.texture).clone();
        if let Some(texture) = texture {
            self.ctx.bus.surface_available.emit(texture);
        }
    }

    /// Tear the live session down; the orchestration task ends afterwards
    pub fn on_pause(&self) {
        info!("Camera controller paused");
        self.ctx.bus.pause.emit(());
    }

    /// Record the current camera id in `out_state`
    pub fn on_save(&self, out_state: &mut Bundle) {
        if let Some(camera_id) = self.current_camera_id() {
            out_state.put_string(SIS_CAMERA_ID, camera_id);
        }
    }

    pub fn on_stop(&self) {}

    /// Drop the orchestration task and everything it holds open
    pub fn on_destroy(&self) {
        self.unsubscribe();
    }

    pub fn current_camera_id(&self) -> Option<String> {
        lock(&self.ctx.selection)
            .as_ref()
            .map(|selection| selection.camera_id.clone())
    }

    /// Watch the orchestration phase
    pub fn phase(&self) -> watch::Receiver<Phase> {
        self.ctx.phase.subscribe()
    }

    /// Whether an orchestration task is running
    pub fn is_subscribed(&self) -> bool {
        lock(&self.subscription)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    fn unsubscribe(&self) {
        let task = lock(&self.subscription).take();
        if let Some(task) = task {
            task.abort();
            debug!("Orchestration task unsubscribed");
        }
    }
}

impl Drop for CameraController {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
