// SPDX-License-Identifier: GPL-3.0-only

//! Host-facing callback traits and their delivery task

use crate::backends::camera::{DisplayRotation, LensFacing};
use crate::errors::{CameraError, OpenFailureReason};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// Notifications the controller sends to its host
///
/// Calls arrive on the controller's delivery task, one at a time, in the order
/// they happened.
pub trait ControllerCallback: Send + Sync {
    /// A still was written to `path`
    fn on_photo_taken(&self, path: &Path, lens_facing: LensFacing);

    /// The camera service refused access
    fn on_camera_access_exception(&self);

    /// A camera could not be opened or was lost while open
    fn on_camera_open_exception(&self, reason: OpenFailureReason);

    /// Any other failure
    fn on_exception(&self, error: &CameraError);
}

/// The view the preview is shown in
pub trait PreviewView: Send + Sync {
    /// Resize the view to the preview's aspect ratio
    fn set_aspect_ratio(&self, width: u32, height: u32);

    /// Current display rotation, read when a still is captured
    fn display_rotation(&self) -> DisplayRotation;
}

/// Event queued for the host
#[derive(Debug)]
pub enum HostEvent {
    PhotoTaken {
        path: PathBuf,
        lens_facing: LensFacing,
    },
    Failure(CameraError),
}

/// Queues host notifications for in-order delivery
///
/// Cloned into every task that reports to the host. Sending never blocks, so
/// platform callbacks and pipeline stages can report from anywhere.
#[derive(Debug, Clone)]
pub struct HostDispatcher {
    sender: mpsc::UnboundedSender<HostEvent>,
}

impl HostDispatcher {
    /// Dispatcher plus the receiving end, for callers that deliver themselves
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Dispatcher whose events are delivered to `callback` on a spawned task
    ///
    /// Must be called from within a tokio runtime. The task ends once every
    /// clone of the dispatcher is dropped.
    pub fn spawn(callback: Arc<dyn ControllerCallback>) -> Self {
        let (dispatcher, mut receiver) = Self::channel();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                Self::deliver(callback.as_ref(), event);
            }
            debug!("Host dispatcher stopped");
        });
        dispatcher
    }

    /// Invoke the callback method matching `event`
    pub fn deliver(callback: &dyn ControllerCallback, event: HostEvent) {
        match event {
            HostEvent::PhotoTaken { path, lens_facing } => {
                callback.on_photo_taken(&path, lens_facing)
            }
            HostEvent::Failure(failure) => {
                error!(error = %failure, "Camera failure");
                failure.report_to(callback);
            }
        }
    }

    pub fn photo_taken(&self, path: PathBuf, lens_facing: LensFacing) {
        self.send(HostEvent::PhotoTaken { path, lens_facing });
    }

    pub fn report(&self, error: CameraError) {
        self.send(HostEvent::Failure(error));
    }

    fn send(&self, event: HostEvent) {
        if self.sender.send(event).is_err() {
            debug!("Host dispatcher closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl ControllerCallback for Calls {
        fn on_photo_taken(&self, path: &Path, lens_facing: LensFacing) {
            self.0
                .lock()
                .unwrap()
                .push(format!("photo {} {lens_facing}", path.display()));
        }
        fn on_camera_access_exception(&self) {
            self.0.lock().unwrap().push("access".into());
        }
        fn on_camera_open_exception(&self, reason: OpenFailureReason) {
            self.0.lock().unwrap().push(format!("open {reason:?}"));
        }
        fn on_exception(&self, _error: &CameraError) {
            self.0.lock().unwrap().push("exception".into());
        }
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let calls = Arc::new(Calls::default());
        let dispatcher = HostDispatcher::spawn(calls.clone());

        dispatcher.report(CameraError::Open(OpenFailureReason::InUse));
        dispatcher.photo_taken(PathBuf::from("/tmp/a.jpg"), LensFacing::Front);
        dispatcher.report(CameraError::AccessDenied("no".into()));
        dispatcher.report(CameraError::Closed);

        for _ in 0..100 {
            if calls.0.lock().unwrap().len() == 4 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(
            calls.0.lock().unwrap().as_slice(),
            &[
                "open InUse".to_string(),
                "photo /tmp/a.jpg front".to_string(),
                "access".to_string(),
                "exception".to_string(),
            ]
        );
    }

    #[test]
    fn test_send_after_receiver_dropped_is_ignored() {
        let (dispatcher, receiver) = HostDispatcher::channel();
        drop(receiver);
        dispatcher.report(CameraError::Closed);
    }
}
