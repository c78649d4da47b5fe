// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for camera operations
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Taking photos through the full controller lifecycle

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stillcam::backends::camera::simulated::{SimulatedPlatform, SimulatedSurfaceTexture};
use stillcam::backends::camera::{CameraPlatform, DisplayRotation, ImageFormat, LensFacing};
use stillcam::constants::{SIS_CAMERA_ID, app_info};
use stillcam::errors::OpenFailureReason;
use stillcam::{
    Bundle, CameraController, CameraError, ControllerCallback, ControllerConfig, Phase,
    PreviewView,
};
use tokio::sync::{mpsc, watch};
use tracing::info;

/// How long to wait for the preview to start or a photo to be saved
const STEP_TIMEOUT: Duration = Duration::from_secs(10);

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let platform = SimulatedPlatform::default();
    let ids = platform.list_cameras()?;

    if ids.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("stillcam {} (simulated platform)", app_info::version());
    println!();
    println!("Available cameras:");
    println!();
    for id in ids {
        let characteristics = platform.characteristics(&id)?;
        let focus = if characteristics.is_fixed_focus() {
            "fixed focus".to_string()
        } else {
            "auto focus".to_string()
        };
        println!(
            "  [{}] {} camera, {}, sensor orientation {}°",
            id, characteristics.lens_facing, focus, characteristics.sensor_orientation
        );

        let top = |sizes: &[stillcam::backends::camera::Size]| {
            sizes
                .iter()
                .take(3)
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "      Preview: {}",
            top(characteristics.output_sizes(ImageFormat::Private))
        );
        println!(
            "      JPEG:    {}",
            top(characteristics.output_sizes(ImageFormat::Jpeg))
        );
        println!();
    }

    Ok(())
}

/// Take a photo, optionally switching camera first
pub fn take_photo(
    mut config: ControllerConfig,
    camera: Option<String>,
    output: Option<PathBuf>,
    switch: bool,
    state_path: Option<PathBuf>,
    rotation: i32,
) -> Result<(), Box<dyn std::error::Error>> {
    config.photo_path = match output {
        Some(path) if path.is_dir() => stillcam::storage::timestamped_photo_path(&path),
        Some(path) => path,
        None => match config.photo_path.parent() {
            Some(dir) => stillcam::storage::timestamped_photo_path(dir),
            None => config.photo_path.clone(),
        },
    };

    let mut saved_state = match &state_path {
        Some(path) => load_bundle(path)?,
        None => Bundle::new(),
    };
    if let Some(camera) = camera {
        saved_state.put_string(SIS_CAMERA_ID, camera);
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let bundle = runtime.block_on(shoot(
        config,
        saved_state,
        switch,
        DisplayRotation::from_degrees(rotation),
    ))?;

    if let Some(path) = &state_path {
        std::fs::write(path, serde_json::to_string_pretty(&bundle)?)?;
    }
    Ok(())
}

async fn shoot(
    config: ControllerConfig,
    saved_state: Bundle,
    switch: bool,
    rotation: DisplayRotation,
) -> Result<Bundle, Box<dyn std::error::Error>> {
    let platform = Arc::new(SimulatedPlatform::default());
    let (sender, mut events) = mpsc::unbounded_channel();
    let controller = CameraController::new(
        platform,
        Arc::new(CliCallback { sender }),
        Arc::new(ConsoleView { rotation }),
        config,
    );
    let mut phase = controller.phase();

    controller.on_create(Some(&saved_state));
    controller.on_start();
    controller.on_resume();
    let texture = SimulatedSurfaceTexture::new();
    controller.surface_texture_available(texture, 1920, 1080);
    wait_for_preview(&mut phase, &mut events).await?;
    println!(
        "Using camera: {}",
        controller.current_camera_id().unwrap_or_default()
    );

    if switch {
        let before = controller.current_camera_id();
        controller.switch_camera();
        tokio::time::timeout(STEP_TIMEOUT, async {
            while controller.current_camera_id() == before
                || *phase.borrow_and_update() != Phase::Previewing
            {
                if phase.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;
        println!(
            "Switched to camera: {}",
            controller.current_camera_id().unwrap_or_default()
        );
    }

    println!("Capturing...");
    controller.take_photo();
    let outcome = tokio::time::timeout(STEP_TIMEOUT, events.recv()).await?;

    controller.on_pause();
    let mut bundle = Bundle::new();
    controller.on_save(&mut bundle);
    controller.on_stop();
    controller.on_destroy();

    match outcome {
        Some(CliEvent::Saved(path, lens_facing)) => {
            println!("Photo saved: {} ({} camera)", path.display(), lens_facing);
            Ok(bundle)
        }
        Some(CliEvent::Failed(message)) => Err(message.into()),
        None => Err("controller stopped before the photo was saved".into()),
    }
}

async fn wait_for_preview(
    phase: &mut watch::Receiver<Phase>,
    events: &mut mpsc::UnboundedReceiver<CliEvent>,
) -> Result<(), Box<dyn std::error::Error>> {
    let preview = async {
        loop {
            match *phase.borrow_and_update() {
                Phase::Previewing => return Ok(()),
                Phase::Failed => break,
                _ => {}
            }
            if phase.changed().await.is_err() {
                break;
            }
        }
        match events.recv().await {
            Some(CliEvent::Failed(message)) => Err(message),
            _ => Err("camera failed to start".to_string()),
        }
    };
    tokio::time::timeout(STEP_TIMEOUT, preview).await??;
    Ok(())
}

fn load_bundle(path: &Path) -> Result<Bundle, Box<dyn std::error::Error>> {
    match std::fs::read_to_string(path) {
        Ok(json) => Ok(serde_json::from_str(&json)?),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Bundle::new()),
        Err(error) => Err(error.into()),
    }
}

enum CliEvent {
    Saved(PathBuf, LensFacing),
    Failed(String),
}

struct CliCallback {
    sender: mpsc::UnboundedSender<CliEvent>,
}

impl CliCallback {
    fn failed(&self, message: String) {
        let _ = self.sender.send(CliEvent::Failed(message));
    }
}

impl ControllerCallback for CliCallback {
    fn on_photo_taken(&self, path: &Path, lens_facing: LensFacing) {
        let _ = self
            .sender
            .send(CliEvent::Saved(path.to_path_buf(), lens_facing));
    }

    fn on_camera_access_exception(&self) {
        self.failed("camera access denied".to_string());
    }

    fn on_camera_open_exception(&self, reason: OpenFailureReason) {
        self.failed(format!("camera could not be opened: {reason}"));
    }

    fn on_exception(&self, error: &CameraError) {
        self.failed(error.to_string());
    }
}

struct ConsoleView {
    rotation: DisplayRotation,
}

impl PreviewView for ConsoleView {
    fn set_aspect_ratio(&self, width: u32, height: u32) {
        info!(width, height, "Preview aspect ratio");
    }

    fn display_rotation(&self) -> DisplayRotation {
        self.rotation
    }
}
