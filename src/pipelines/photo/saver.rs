// SPDX-License-Identifier: GPL-3.0-only

//! Saving stills as they land in the image sink

use crate::backends::camera::adapter;
use crate::backends::camera::{ImageSink, LensFacing};
use crate::controller::HostDispatcher;
use crate::errors::CameraError;
use crate::storage;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Writes every image the sink produces to one photo path
pub struct ImageSaver {
    photo_path: PathBuf,
    lens_facing: LensFacing,
    host: HostDispatcher,
    failures: mpsc::UnboundedSender<CameraError>,
}

impl ImageSaver {
    /// # Arguments
    /// * `photo_path` - Target file, overwritten by each shot
    /// * `lens_facing` - Reported to the host along with the saved path
    /// * `host` - Receives `on_photo_taken` after each successful write
    /// * `failures` - Receives write errors for the session to handle
    pub fn new(
        photo_path: PathBuf,
        lens_facing: LensFacing,
        host: HostDispatcher,
        failures: mpsc::UnboundedSender<CameraError>,
    ) -> Self {
        Self {
            photo_path,
            lens_facing,
            host,
            failures,
        }
    }

    /// Start saving from `sink` until the returned subscription is dropped
    pub fn subscribe(self, sink: Arc<dyn ImageSink>) -> SinkSubscription {
        let mut images = adapter::on_image_available(Arc::clone(&sink));
        let task = tokio::spawn(async move {
            while let Some(sink) = images.next().await {
                let Some(image) = sink.acquire_latest_image() else {
                    debug!("Image available but the sink was empty");
                    continue;
                };
                match storage::save_image(&image, &self.photo_path).await {
                    Ok(path) => {
                        info!(
                            path = %path.display(),
                            bytes = image.data.len(),
                            lens_facing = %self.lens_facing,
                            "Photo saved"
                        );
                        self.host.photo_taken(path, self.lens_facing);
                    }
                    Err(error) => {
                        let _ = self.failures.send(CameraError::from(error));
                    }
                }
            }
        });

        SinkSubscription { sink, task }
    }
}

/// Keeps a sink's saver running; dropping it stops saving and closes the sink
pub struct SinkSubscription {
    sink: Arc<dyn ImageSink>,
    task: JoinHandle<()>,
}

impl Drop for SinkSubscription {
    fn drop(&mut self) {
        self.task.abort();
        self.sink.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::simulated::{SimulatedPlatform, TraceEvent};
    use crate::backends::camera::{CameraPlatform, ImageFormat, Size};
    use crate::controller::{ControllerCallback, HostEvent};
    use crate::errors::OpenFailureReason;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Saved(Mutex<Vec<PathBuf>>);

    impl ControllerCallback for Saved {
        fn on_photo_taken(&self, path: &Path, _lens_facing: LensFacing) {
            self.0.lock().unwrap().push(path.to_path_buf());
        }
        fn on_camera_access_exception(&self) {}
        fn on_camera_open_exception(&self, _reason: OpenFailureReason) {}
        fn on_exception(&self, _error: &CameraError) {}
    }

    #[tokio::test]
    async fn test_saver_writes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("shot.jpg");
        let (host, mut events) = HostDispatcher::channel();
        let (failures, _failure_events) = mpsc::unbounded_channel();

        let platform = SimulatedPlatform::default();
        let sink = platform
            .make_image_sink(Size::new(640, 480), ImageFormat::Jpeg, 1)
            .unwrap();
        let subscription = ImageSaver::new(target.clone(), LensFacing::Back, host, failures)
            .subscribe(Arc::clone(&sink));

        // Let the listener install before producing
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        platform.push_image(sink.surface(), vec![0xFF, 0xD8, 0x01, 0xFF, 0xD9]);

        let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            HostEvent::PhotoTaken { path, lens_facing } => {
                assert_eq!(path, target);
                assert_eq!(lens_facing, LensFacing::Back);
            }
            HostEvent::Failure(error) => panic!("unexpected failure: {error}"),
        }
        assert_eq!(
            std::fs::read(&target).unwrap(),
            vec![0xFF, 0xD8, 0x01, 0xFF, 0xD9]
        );

        let callback = Saved::default();
        HostDispatcher::deliver(&callback, HostEvent::PhotoTaken {
            path: target.clone(),
            lens_facing: LensFacing::Back,
        });
        assert_eq!(callback.0.lock().unwrap().as_slice(), &[target]);

        drop(subscription);
        assert!(
            platform
                .trace()
                .contains(&TraceEvent::SinkClosed { surface: sink.surface() })
        );
    }

    #[tokio::test]
    async fn test_write_error_goes_to_failures() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the photo should go makes the write fail
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        let (host, _events) = HostDispatcher::channel();
        let (failures, mut failure_events) = mpsc::unbounded_channel();

        let platform = SimulatedPlatform::default();
        let sink = platform
            .make_image_sink(Size::new(640, 480), ImageFormat::Jpeg, 1)
            .unwrap();
        let _subscription =
            ImageSaver::new(target, LensFacing::Front, host, failures).subscribe(Arc::clone(&sink));

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        platform.push_image(sink.surface(), vec![1, 2, 3]);

        let error = tokio::time::timeout(std::time::Duration::from_secs(5), failure_events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(error, CameraError::Io(_)));
    }
}
