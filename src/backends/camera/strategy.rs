// SPDX-License-Identifier: GPL-3.0-only

//! Camera and stream size selection

use super::{CameraCharacteristics, CameraPlatform, ImageFormat, LensFacing, Size};
use crate::constants::{ASPECT_RATIO_TOLERANCE, LayoutOrientation};
use crate::errors::{CameraError, CameraResult};
use tracing::debug;

/// Camera to start with: the first back-facing camera, else the first listed
///
/// Returns `Ok(None)` when the platform has no cameras.
pub fn choose_default_camera(platform: &dyn CameraPlatform) -> CameraResult<Option<String>> {
    let ids = platform.list_cameras()?;
    for id in &ids {
        if platform.characteristics(id)?.lens_facing == LensFacing::Back {
            return Ok(Some(id.clone()));
        }
    }
    Ok(ids.into_iter().next())
}

/// Camera to switch to from `current`
///
/// Prefers the first camera facing the other way. Falls back to the next id
/// in platform order, and returns `current` itself when it is the only camera.
pub fn switch_camera(platform: &dyn CameraPlatform, current: &str) -> CameraResult<String> {
    let ids = platform.list_cameras()?;
    let Some(position) = ids.iter().position(|id| id == current) else {
        // Current camera vanished; start over from the default
        return choose_default_camera(platform)?.ok_or(CameraError::NoCameraFound);
    };

    let facing = platform.characteristics(current)?.lens_facing;
    for id in ids.iter().filter(|id| id.as_str() != current) {
        if platform.characteristics(id)?.lens_facing != facing {
            debug!(from = current, to = %id, "Switching to opposite-facing camera");
            return Ok(id.clone());
        }
    }

    Ok(ids[(position + 1) % ids.len()].clone())
}

/// Largest preview size fitting `max` in either orientation, else the smallest
pub fn preview_size(characteristics: &CameraCharacteristics, max: Size) -> CameraResult<Size> {
    let sizes = characteristics.output_sizes(ImageFormat::Private);
    let fitting = sizes
        .iter()
        .filter(|size| size.fits_within(max) || size.fits_within(max.transposed()))
        .max_by_key(|size| size.area());

    fitting
        .or_else(|| sizes.iter().min_by_key(|size| size.area()))
        .copied()
        .ok_or_else(|| CameraError::Platform("camera reports no preview sizes".to_string()))
}

/// Largest JPEG size with the preview's aspect ratio, else the largest JPEG
/// size, else the preview size itself
pub fn still_size(characteristics: &CameraCharacteristics, preview: Size) -> Size {
    let target = preview.aspect_ratio();
    let sizes = characteristics.output_sizes(ImageFormat::Jpeg);

    sizes
        .iter()
        .filter(|size| (size.aspect_ratio() - target).abs() < ASPECT_RATIO_TOLERANCE)
        .max_by_key(|size| size.area())
        .or_else(|| sizes.iter().max_by_key(|size| size.area()))
        .copied()
        .unwrap_or(preview)
}

/// Aspect ratio the view should apply to show `preview` in `layout`
pub fn view_aspect_ratio(preview: Size, layout: LayoutOrientation) -> Size {
    match layout {
        LayoutOrientation::Landscape => preview,
        LayoutOrientation::Portrait => preview.transposed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::simulated::{SimulatedCamera, SimulatedPlatform};

    #[test]
    fn test_default_camera_prefers_back() {
        let platform = SimulatedPlatform::new(vec![
            SimulatedCamera::front("front"),
            SimulatedCamera::back("main"),
        ]);
        assert_eq!(
            choose_default_camera(&platform).unwrap(),
            Some("main".to_string())
        );
    }

    #[test]
    fn test_default_camera_falls_back_to_first() {
        let platform = SimulatedPlatform::new(vec![
            SimulatedCamera::front("a"),
            SimulatedCamera::front("b"),
        ]);
        assert_eq!(choose_default_camera(&platform).unwrap(), Some("a".to_string()));
        assert_eq!(
            choose_default_camera(&SimulatedPlatform::new(vec![])).unwrap(),
            None
        );
    }

    #[test]
    fn test_switch_prefers_opposite_facing() {
        let platform = SimulatedPlatform::new(vec![
            SimulatedCamera::back("0"),
            SimulatedCamera::back("2"),
            SimulatedCamera::front("1"),
        ]);
        assert_eq!(switch_camera(&platform, "0").unwrap(), "1");
        assert_eq!(switch_camera(&platform, "1").unwrap(), "0");
    }

    #[test]
    fn test_switch_cycles_same_facing() {
        let platform = SimulatedPlatform::new(vec![
            SimulatedCamera::back("0"),
            SimulatedCamera::back("1"),
        ]);
        assert_eq!(switch_camera(&platform, "0").unwrap(), "1");
        assert_eq!(switch_camera(&platform, "1").unwrap(), "0");
    }

    #[test]
    fn test_switch_single_camera_keeps_id() {
        let platform = SimulatedPlatform::new(vec![SimulatedCamera::back("0")]);
        assert_eq!(switch_camera(&platform, "0").unwrap(), "0");
    }

    #[test]
    fn test_preview_size_fits_bounds() {
        let back = SimulatedCamera::back("0").characteristics;
        assert_eq!(
            preview_size(&back, Size::new(1920, 1080)).unwrap(),
            Size::new(1920, 1080)
        );
        // Portrait bounds are accepted the same way
        assert_eq!(
            preview_size(&back, Size::new(1080, 1920)).unwrap(),
            Size::new(1920, 1080)
        );
        assert_eq!(
            preview_size(&back, Size::new(100, 100)).unwrap(),
            Size::new(640, 480)
        );
    }

    #[test]
    fn test_still_size_matches_aspect() {
        let back = SimulatedCamera::back("0").characteristics;
        assert_eq!(still_size(&back, Size::new(1920, 1080)), Size::new(4000, 2250));
        assert_eq!(still_size(&back, Size::new(640, 480)), Size::new(4032, 3024));
        // Square previews have no matching JPEG size; the largest wins
        assert_eq!(still_size(&back, Size::new(1000, 1000)), Size::new(4032, 3024));
    }

    #[test]
    fn test_view_aspect_ratio_swaps_for_portrait() {
        let preview = Size::new(1920, 1080);
        assert_eq!(
            view_aspect_ratio(preview, LayoutOrientation::Portrait),
            Size::new(1080, 1920)
        );
        assert_eq!(
            view_aspect_ratio(preview, LayoutOrientation::Landscape),
            preview
        );
    }
}
