// SPDX-License-Identifier: GPL-3.0-only

//! 3A and request construction for one camera

use crate::backends::camera::{
    AeMode, AfMode, AwbMode, CameraCharacteristics, CameraDevice, CaptureIntent,
    CaptureRequestBuilder, ControlMode, DisplayRotation, LensFacing, RequestTemplate, Surface,
    Trigger,
};
use crate::errors::CameraResult;
use std::sync::Arc;

/// Builds preview and still requests with the camera's preferred 3A modes
#[derive(Debug, Clone)]
pub struct RequestControls {
    characteristics: Arc<CameraCharacteristics>,
}

impl RequestControls {
    pub fn new(characteristics: Arc<CameraCharacteristics>) -> Self {
        Self { characteristics }
    }

    pub fn is_fixed_focus(&self) -> bool {
        self.characteristics.is_fixed_focus()
    }

    /// Apply automatic control with the best available AF, AE and AWB modes
    ///
    /// - AF: continuous-picture, else auto; left unset on fixed-focus lenses
    /// - AE: on with auto flash, else on
    /// - AWB: auto when supported, otherwise left unset
    pub fn setup_3a(&self, builder: &mut CaptureRequestBuilder) {
        let characteristics = &self.characteristics;
        builder.set_control_mode(ControlMode::Auto);

        if !self.is_fixed_focus() {
            let af_mode = if characteristics
                .af_available_modes
                .contains(&AfMode::ContinuousPicture)
            {
                AfMode::ContinuousPicture
            } else {
                AfMode::Auto
            };
            builder.set_af_mode(af_mode);
        }

        let ae_mode = if characteristics
            .ae_available_modes
            .contains(&AeMode::OnAutoFlash)
        {
            AeMode::OnAutoFlash
        } else {
            AeMode::On
        };
        builder.set_ae_mode(ae_mode);

        if characteristics.awb_available_modes.contains(&AwbMode::Auto) {
            builder.set_awb_mode(AwbMode::Auto);
        }
    }

    /// Preview-template request targeting the preview surface
    pub fn preview_builder(
        &self,
        device: &dyn CameraDevice,
        preview_surface: Surface,
    ) -> CameraResult<CaptureRequestBuilder> {
        let mut builder = device.create_capture_request(RequestTemplate::Preview)?;
        builder.add_target(preview_surface);
        self.setup_3a(&mut builder);
        Ok(builder)
    }

    /// Zero-shutter-lag still request targeting the image sink
    pub fn still_builder(
        &self,
        device: &dyn CameraDevice,
        sink_surface: Surface,
        rotation: DisplayRotation,
    ) -> CameraResult<CaptureRequestBuilder> {
        let mut builder = device.create_capture_request(RequestTemplate::ZeroShutterLag)?;
        builder
            .set_capture_intent(CaptureIntent::StillCapture)
            .set_ae_precapture_trigger(Trigger::Idle)
            .add_target(sink_surface);
        self.setup_3a(&mut builder);
        builder.set_jpeg_orientation(jpeg_orientation(
            self.characteristics.sensor_orientation,
            self.characteristics.lens_facing,
            rotation,
        ));
        Ok(builder)
    }
}

/// Clockwise JPEG rotation for a shot taken at `rotation`
///
/// Front cameras are mirrored, so the display rotation counts backwards.
pub fn jpeg_orientation(
    sensor_orientation: u32,
    lens_facing: LensFacing,
    rotation: DisplayRotation,
) -> u32 {
    let sign = if lens_facing == LensFacing::Front { -1 } else { 1 };
    let degrees = i64::from(sensor_orientation) + sign * i64::from(rotation.degrees()) + 360;
    degrees.rem_euclid(360) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::simulated::SimulatedCamera;
    use crate::backends::camera::{CameraPlatform, DeviceEvent, simulated::SimulatedPlatform};
    use tokio::sync::mpsc;

    fn controls(camera: SimulatedCamera) -> RequestControls {
        RequestControls::new(Arc::new(camera.characteristics))
    }

    #[test]
    fn test_setup_3a_prefers_continuous_picture_and_flash() {
        let mut builder = CaptureRequestBuilder::new(RequestTemplate::Preview);
        controls(SimulatedCamera::back("0")).setup_3a(&mut builder);
        let request = builder.build();

        assert_eq!(request.control_mode, Some(ControlMode::Auto));
        assert_eq!(request.af_mode, Some(AfMode::ContinuousPicture));
        assert_eq!(request.ae_mode, Some(AeMode::OnAutoFlash));
        assert_eq!(request.awb_mode, Some(AwbMode::Auto));
    }

    #[test]
    fn test_setup_3a_fallbacks() {
        let mut camera = SimulatedCamera::back("0");
        camera.characteristics.af_available_modes = vec![AfMode::Off, AfMode::Auto];
        camera.characteristics.ae_available_modes = vec![AeMode::On];
        camera.characteristics.awb_available_modes = vec![AwbMode::Off];

        let mut builder = CaptureRequestBuilder::new(RequestTemplate::Preview);
        controls(camera).setup_3a(&mut builder);
        let request = builder.build();

        assert_eq!(request.af_mode, Some(AfMode::Auto));
        assert_eq!(request.ae_mode, Some(AeMode::On));
        assert_eq!(request.awb_mode, None);
    }

    #[test]
    fn test_fixed_focus_leaves_af_unset() {
        let mut builder = CaptureRequestBuilder::new(RequestTemplate::Preview);
        controls(SimulatedCamera::back("0").fixed_focus()).setup_3a(&mut builder);
        assert_eq!(builder.build().af_mode, None);
    }

    #[test]
    fn test_jpeg_orientation() {
        use DisplayRotation::*;
        assert_eq!(jpeg_orientation(90, LensFacing::Back, Rotation0), 90);
        assert_eq!(jpeg_orientation(90, LensFacing::Back, Rotation90), 180);
        assert_eq!(jpeg_orientation(90, LensFacing::Back, Rotation270), 0);
        assert_eq!(jpeg_orientation(270, LensFacing::Front, Rotation0), 270);
        assert_eq!(jpeg_orientation(270, LensFacing::Front, Rotation90), 180);
        assert_eq!(jpeg_orientation(270, LensFacing::Front, Rotation270), 0);
    }

    #[tokio::test]
    async fn test_still_builder_targets_sink_with_orientation() {
        let platform = SimulatedPlatform::default();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        platform
            .open(
                "0",
                Arc::new(move |event: DeviceEvent| {
                    if let DeviceEvent::Opened(device) = event {
                        let _ = sender.send(device);
                    }
                }),
            )
            .unwrap();
        let device = receiver.recv().await.unwrap();

        let request = controls(SimulatedCamera::back("0"))
            .still_builder(device.as_ref(), Surface::new(77), DisplayRotation::Rotation90)
            .unwrap()
            .build();

        assert_eq!(request.template, RequestTemplate::ZeroShutterLag);
        assert_eq!(request.capture_intent, CaptureIntent::StillCapture);
        assert_eq!(request.ae_precapture_trigger, Some(Trigger::Idle));
        assert_eq!(request.targets, vec![Surface::new(77)]);
        assert_eq!(request.jpeg_orientation, Some(180));
        assert_eq!(request.af_mode, Some(AfMode::ContinuousPicture));
        device.close();
    }
}
