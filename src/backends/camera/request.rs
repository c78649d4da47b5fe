// SPDX-License-Identifier: GPL-3.0-only

//! Capture requests and their results

use super::types::{
    AeMode, AeState, AfMode, AfState, AwbMode, CaptureIntent, ControlMode, Surface, Trigger,
};

/// Starting point for a request's default settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTemplate {
    Preview,
    StillCapture,
    ZeroShutterLag,
}

impl RequestTemplate {
    fn default_intent(self) -> CaptureIntent {
        match self {
            RequestTemplate::Preview => CaptureIntent::Preview,
            RequestTemplate::StillCapture => CaptureIntent::StillCapture,
            RequestTemplate::ZeroShutterLag => CaptureIntent::ZeroShutterLag,
        }
    }
}

/// Immutable set of capture parameters plus the surfaces that receive the frame
///
/// Unset fields (`None`) leave the platform default in effect.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    pub template: RequestTemplate,
    pub targets: Vec<Surface>,
    pub control_mode: Option<ControlMode>,
    pub af_mode: Option<AfMode>,
    pub ae_mode: Option<AeMode>,
    pub awb_mode: Option<AwbMode>,
    pub af_trigger: Option<Trigger>,
    pub ae_precapture_trigger: Option<Trigger>,
    pub capture_intent: CaptureIntent,
    /// Clockwise rotation in degrees written into the JPEG
    pub jpeg_orientation: Option<u32>,
}

impl CaptureRequest {
    pub fn targets(&self, surface: Surface) -> bool {
        self.targets.contains(&surface)
    }
}

/// Mutable builder for [`CaptureRequest`]
///
/// Obtained from a device so template defaults match the hardware.
/// [`build`](Self::build) snapshots the current settings, so one builder can
/// produce a trigger request and then the follow-up repeating request.
#[derive(Debug, Clone)]
pub struct CaptureRequestBuilder {
    request: CaptureRequest,
}

impl CaptureRequestBuilder {
    pub fn new(template: RequestTemplate) -> Self {
        Self {
            request: CaptureRequest {
                template,
                targets: Vec::new(),
                control_mode: None,
                af_mode: None,
                ae_mode: None,
                awb_mode: None,
                af_trigger: None,
                ae_precapture_trigger: None,
                capture_intent: template.default_intent(),
                jpeg_orientation: None,
            },
        }
    }

    pub fn template(&self) -> RequestTemplate {
        self.request.template
    }

    pub fn add_target(&mut self, surface: Surface) -> &mut Self {
        if !self.request.targets.contains(&surface) {
            self.request.targets.push(surface);
        }
        self
    }

    pub fn set_control_mode(&mut self, mode: ControlMode) -> &mut Self {
        self.request.control_mode = Some(mode);
        self
    }

    pub fn set_af_mode(&mut self, mode: AfMode) -> &mut Self {
        self.request.af_mode = Some(mode);
        self
    }

    pub fn set_ae_mode(&mut self, mode: AeMode) -> &mut Self {
        self.request.ae_mode = Some(mode);
        self
    }

    pub fn set_awb_mode(&mut self, mode: AwbMode) -> &mut Self {
        self.request.awb_mode = Some(mode);
        self
    }

    pub fn set_af_trigger(&mut self, trigger: Trigger) -> &mut Self {
        self.request.af_trigger = Some(trigger);
        self
    }

    pub fn set_ae_precapture_trigger(&mut self, trigger: Trigger) -> &mut Self {
        self.request.ae_precapture_trigger = Some(trigger);
        self
    }

    pub fn set_capture_intent(&mut self, intent: CaptureIntent) -> &mut Self {
        self.request.capture_intent = intent;
        self
    }

    pub fn set_jpeg_orientation(&mut self, degrees: u32) -> &mut Self {
        self.request.jpeg_orientation = Some(degrees % 360);
        self
    }

    pub fn build(&self) -> CaptureRequest {
        self.request.clone()
    }
}

/// Final metadata for one processed frame
#[derive(Debug, Clone, PartialEq)]
pub struct TotalCaptureResult {
    pub frame_number: u64,
    pub request: CaptureRequest,
    /// `None` when the camera does not report AF state
    pub af_state: Option<AfState>,
    /// `None` when the camera does not report AE state
    pub ae_state: Option<AeState>,
}

/// A submitted request that produced no result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFailure {
    pub frame_number: u64,
    pub reason: String,
}
