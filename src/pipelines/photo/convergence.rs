// SPDX-License-Identifier: GPL-3.0-only

//! Waiting for auto-focus and auto-exposure to settle before a still
//!
//! Both waits follow the same shape:
//!
//! 1. submit one request with the routine's trigger set to START and wait for
//!    its result
//! 2. replace the repeating preview with the same request, trigger IDLE
//! 3. watch preview results until the routine reports a settled state, or
//!    until the frame limit runs out (the shot proceeds either way)
//!
//! A result without AF/AE state counts as settled: the camera does not report
//! that routine, so there is nothing to wait for.

use super::{RequestControls, SessionState};
use crate::backends::camera::adapter::{self, PreviewStream};
use crate::backends::camera::{CaptureRequestBuilder, TotalCaptureResult, Trigger};
use crate::errors::{CameraError, CameraResult};
use futures::StreamExt;
use tracing::{debug, warn};

/// 3A routine being waited on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routine {
    AutoFocus,
    AutoExposure,
}

impl Routine {
    fn label(self) -> &'static str {
        match self {
            Routine::AutoFocus => "AF",
            Routine::AutoExposure => "AE",
        }
    }

    fn set_trigger(self, builder: &mut CaptureRequestBuilder, trigger: Trigger) {
        match self {
            Routine::AutoFocus => builder.set_af_trigger(trigger),
            Routine::AutoExposure => builder.set_ae_precapture_trigger(trigger),
        };
    }

    /// Whether `result` shows the routine settled (or not reported at all)
    pub fn has_converged(self, result: &TotalCaptureResult) -> bool {
        match self {
            Routine::AutoFocus => result.af_state.is_none_or(|state| state.is_converged()),
            Routine::AutoExposure => result.ae_state.is_none_or(|state| state.is_converged()),
        }
    }
}

/// How a wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceOutcome {
    /// Nothing to wait for (fixed-focus lens)
    Skipped,
    /// Settled `frames` sensor frames after the trigger
    Converged { frames: u32 },
    /// Frame limit reached without settling
    TimedOut { frames: u32 },
}

/// Trigger auto-focus and wait for it to lock
///
/// Fixed-focus lenses skip the wait without touching the session.
pub async fn wait_for_af(
    state: &mut SessionState,
    preview: &mut Option<PreviewStream>,
    controls: &RequestControls,
    frame_limit: u32,
) -> CameraResult<ConvergenceOutcome> {
    if controls.is_fixed_focus() {
        debug!(camera_id = %state.camera_id, "Fixed-focus lens, skipping AF");
        return Ok(ConvergenceOutcome::Skipped);
    }
    wait_for(Routine::AutoFocus, state, preview, controls, frame_limit).await
}

/// Run the AE precapture sequence and wait for exposure to settle
pub async fn wait_for_ae(
    state: &mut SessionState,
    preview: &mut Option<PreviewStream>,
    controls: &RequestControls,
    frame_limit: u32,
) -> CameraResult<ConvergenceOutcome> {
    wait_for(Routine::AutoExposure, state, preview, controls, frame_limit).await
}

async fn wait_for(
    routine: Routine,
    state: &mut SessionState,
    preview: &mut Option<PreviewStream>,
    controls: &RequestControls,
    frame_limit: u32,
) -> CameraResult<ConvergenceOutcome> {
    let session = state.capture_session.clone().ok_or(CameraError::Closed)?;
    let device = state.camera_device.clone().ok_or(CameraError::Closed)?;
    let mut builder = controls.preview_builder(device.as_ref(), state.preview_surface)?;

    routine.set_trigger(&mut builder, Trigger::Start);
    let triggered = adapter::capture(session.clone(), builder.build()).await?;
    let trigger_frame = triggered.frame_number;
    debug!(routine = routine.label(), frame = trigger_frame, "Trigger accepted");
    state.result = Some(triggered);

    routine.set_trigger(&mut builder, Trigger::Idle);
    *preview = None;
    let frames_stream = preview.insert(adapter::set_repeating_request(session, builder.build()));

    loop {
        let result = frames_stream.next().await.ok_or(CameraError::Closed)??;
        // Counted in sensor frames since the trigger, not in results seen
        let frames = u32::try_from(result.frame_number.saturating_sub(trigger_frame))
            .unwrap_or(u32::MAX);
        let converged = routine.has_converged(&result);
        state.result = Some(result);

        if converged {
            debug!(routine = routine.label(), frames, "Converged");
            return Ok(ConvergenceOutcome::Converged { frames });
        }
        if frames >= frame_limit {
            warn!(
                routine = routine.label(),
                frames, "Did not converge within the frame limit, capturing anyway"
            );
            return Ok(ConvergenceOutcome::TimedOut { frames });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::adapter::{DeviceStream, SessionStream};
    use crate::backends::camera::simulated::{
        SimulatedCamera, SimulatedPlatform, SimulatedSurfaceTexture, SimulationScript, TraceEvent,
    };
    use crate::backends::camera::{CameraPlatform, ImageFormat, Size};
    use crate::pipelines::photo::{create_session, init_state, open_device, start_preview};
    use std::sync::Arc;

    struct Previewing {
        state: SessionState,
        controls: RequestControls,
        preview: Option<PreviewStream>,
        _session: SessionStream,
        _device: DeviceStream,
    }

    async fn previewing(platform: &SimulatedPlatform) -> Previewing {
        let shared: Arc<dyn CameraPlatform> = Arc::new(platform.clone());
        let characteristics = Arc::new(platform.characteristics("0").unwrap());
        let mut state = init_state(
            Arc::clone(&shared),
            "0".to_string(),
            SimulatedSurfaceTexture::new(),
            Size::new(1920, 1080),
        );
        state.image_sink = Some(
            shared
                .make_image_sink(Size::new(4000, 2250), ImageFormat::Jpeg, 1)
                .unwrap(),
        );
        let device = open_device(&mut state).await.unwrap();
        let session = create_session(&mut state).await.unwrap();
        let controls = RequestControls::new(characteristics);
        let preview = start_preview(&mut state, &controls).await.unwrap();

        Previewing {
            state,
            controls,
            preview: Some(preview),
            _session: session,
            _device: device,
        }
    }

    #[tokio::test]
    async fn test_af_converges_after_scripted_frames() {
        let platform = SimulatedPlatform::default().with_script(SimulationScript::fast());
        let mut p = previewing(&platform).await;

        let outcome = wait_for_af(&mut p.state, &mut p.preview, &p.controls, 60)
            .await
            .unwrap();
        assert_eq!(outcome, ConvergenceOutcome::Converged { frames: 3 });
        assert!(platform.trace().contains(&TraceEvent::CaptureSubmitted {
            af_trigger: Some(Trigger::Start),
            ae_precapture_trigger: None,
            still: false,
        }));
        // Preview keeps running with the idle-trigger request
        assert_eq!(
            p.state.result.as_ref().unwrap().request.af_trigger,
            Some(Trigger::Idle)
        );
    }

    #[tokio::test]
    async fn test_ae_converges_after_scripted_frames() {
        let platform = SimulatedPlatform::default().with_script(SimulationScript::fast());
        let mut p = previewing(&platform).await;

        let outcome = wait_for_ae(&mut p.state, &mut p.preview, &p.controls, 60)
            .await
            .unwrap();
        assert_eq!(outcome, ConvergenceOutcome::Converged { frames: 5 });
    }

    #[tokio::test]
    async fn test_wait_gives_up_at_frame_limit() {
        let platform = SimulatedPlatform::default().with_script(SimulationScript {
            af_lock_after: None,
            ..SimulationScript::fast()
        });
        let mut p = previewing(&platform).await;

        let outcome = wait_for_af(&mut p.state, &mut p.preview, &p.controls, 10)
            .await
            .unwrap();
        assert_eq!(outcome, ConvergenceOutcome::TimedOut { frames: 10 });
    }

    #[tokio::test]
    async fn test_unreported_state_counts_as_converged() {
        let platform = SimulatedPlatform::default().with_script(SimulationScript {
            report_3a_state: false,
            af_lock_after: None,
            ae_converge_after: None,
            ..SimulationScript::fast()
        });
        let mut p = previewing(&platform).await;

        let af = wait_for_af(&mut p.state, &mut p.preview, &p.controls, 60)
            .await
            .unwrap();
        let ae = wait_for_ae(&mut p.state, &mut p.preview, &p.controls, 60)
            .await
            .unwrap();
        // The first preview frame after each trigger settles it
        assert!(matches!(af, ConvergenceOutcome::Converged { frames } if frames <= 2));
        assert!(matches!(ae, ConvergenceOutcome::Converged { frames } if frames <= 2));
    }

    #[tokio::test]
    async fn test_fixed_focus_skips_af() {
        let platform =
            SimulatedPlatform::new(vec![SimulatedCamera::back("0").fixed_focus()])
                .with_script(SimulationScript::fast());
        let mut p = previewing(&platform).await;

        let outcome = wait_for_af(&mut p.state, &mut p.preview, &p.controls, 60)
            .await
            .unwrap();
        assert_eq!(outcome, ConvergenceOutcome::Skipped);
        assert!(!platform.trace().iter().any(|event| matches!(
            event,
            TraceEvent::CaptureSubmitted {
                af_trigger: Some(_),
                ..
            }
        )));
    }
}
