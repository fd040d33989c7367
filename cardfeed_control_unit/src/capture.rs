//! Orientation decision and the capture callback payload.
//!
//! The orientation marker is printed in one corner of the card. Both corner
//! regions are searched independently: a marker in `near` means the card went
//! in upside down and the image is turned 180°, a marker in `far` means it is
//! already upright. Neither means the card is returned.

use cardfeed_common::control_unit::config::{CaptureConfig, Region};
use cardfeed_common::hal::driver::CaptureDevice;
use cardfeed_common::hal::types::{DynamicImage, MarkerLocation};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one capture cycle, handed to the host callback.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    /// Captured image, already rotated when `orientation_applied`.
    /// `None` when the device failed.
    pub image: Option<DynamicImage>,
    /// Whether a 180° rotation was applied.
    pub orientation_applied: bool,
    /// Whether a marker was found.
    pub success: bool,
    /// The marker that decided the orientation.
    pub marker: Option<MarkerLocation>,
}

impl CaptureOutcome {
    /// Outcome of a device failure.
    pub fn device_failure() -> Self {
        Self {
            image: None,
            orientation_applied: false,
            success: false,
            marker: None,
        }
    }
}

/// Host callback, invoked once per capture cycle.
pub type CaptureCallback = Box<dyn FnMut(CaptureOutcome) + Send>;

/// Decide the orientation of `image` from the marker position.
///
/// When both regions hold a marker, `near` wins.
pub fn orient<C: CaptureDevice + ?Sized>(
    camera: &C,
    image: DynamicImage,
    regions: &CaptureConfig,
) -> CaptureOutcome {
    let near = search(camera, &image, &regions.near);
    let far = search(camera, &image, &regions.far);

    match (near, far) {
        (Some(marker), other) => {
            if other.is_some() {
                warn!("Marker found in both regions, using near");
            }
            info!("Marker {:?} in near region, rotating 180°", marker.payload);
            CaptureOutcome {
                image: Some(image.rotate180()),
                orientation_applied: true,
                success: true,
                marker: Some(marker),
            }
        }
        (None, Some(marker)) => {
            info!("Marker {:?} in far region, image upright", marker.payload);
            CaptureOutcome {
                image: Some(image),
                orientation_applied: false,
                success: true,
                marker: Some(marker),
            }
        }
        (None, None) => {
            warn!("No orientation marker found");
            CaptureOutcome {
                image: Some(image),
                orientation_applied: false,
                success: false,
                marker: None,
            }
        }
    }
}

fn search<C: CaptureDevice + ?Sized>(
    camera: &C,
    image: &DynamicImage,
    region: &Region,
) -> Option<MarkerLocation> {
    let (x, y, width, height) = region.to_pixels(image.width(), image.height());
    debug!("Searching marker in {}x{}+{}+{}", width, height, x, y);
    camera.locate_marker(&image.crop_imm(x, y, width, height))
}

// ─── Simulated capture injection ────────────────────────────────────

/// A pending simulated capture. Without an image, the device is used.
#[derive(Debug, Clone, Default)]
pub struct Injection {
    pub image: Option<DynamicImage>,
}

/// Host side of the simulated-capture injection point.
///
/// Cloneable; every clone shares one slot with the controller.
#[derive(Debug, Clone, Default)]
pub struct CaptureInjector {
    slot: Arc<Mutex<Option<Injection>>>,
}

impl CaptureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a capture cycle, optionally with a prepared frame.
    ///
    /// A request still pending is replaced.
    pub fn inject(&self, image: Option<DynamicImage>) {
        *self.slot.lock() = Some(Injection { image });
    }

    /// Whether a request is waiting.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Consume the pending request.
    pub fn take(&self) -> Option<Injection> {
        self.slot.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardfeed_hal::drivers::simulation::{MarkerPlacement, SimCamera};
    use image::{GrayImage, Luma};

    fn frame_with(placement: MarkerPlacement) -> (SimCamera, DynamicImage) {
        let mut camera = SimCamera::new(CaptureConfig::default());
        camera.handle().set_marker(placement);
        let frame = camera.capture_still().unwrap();
        (camera, frame)
    }

    #[test]
    fn near_marker_rotates() {
        let regions = CaptureConfig::default();
        let (camera, frame) = frame_with(MarkerPlacement::Near);
        let outcome = orient(&camera, frame, &regions);
        assert!(outcome.success);
        assert!(outcome.orientation_applied);

        // Bottom-left near corner turns into the top-right far corner.
        let rotated = outcome.image.unwrap();
        assert!(search(&camera, &rotated, &regions.far).is_some());
        assert!(search(&camera, &rotated, &regions.near).is_none());
    }

    #[test]
    fn far_marker_keeps_image() {
        let (camera, frame) = frame_with(MarkerPlacement::Far);
        let original = frame.clone();
        let outcome = orient(&camera, frame, &CaptureConfig::default());
        assert!(outcome.success);
        assert!(!outcome.orientation_applied);
        assert_eq!(outcome.image.unwrap().as_bytes(), original.as_bytes());
    }

    #[test]
    fn missing_marker_fails() {
        let (camera, frame) = frame_with(MarkerPlacement::Absent);
        let outcome = orient(&camera, frame, &CaptureConfig::default());
        assert!(!outcome.success);
        assert!(!outcome.orientation_applied);
        assert!(outcome.image.is_some());
        assert!(outcome.marker.is_none());
    }

    #[test]
    fn marker_in_both_regions_prefers_near() {
        let regions = CaptureConfig::default();
        let camera = SimCamera::new(regions);
        let mut img = GrayImage::from_pixel(100, 100, Luma([255]));
        // near: bottom-left, far: top-right
        img.put_pixel(10, 80, Luma([0]));
        img.put_pixel(90, 10, Luma([0]));
        let outcome = orient(&camera, DynamicImage::ImageLuma8(img), &regions);
        assert!(outcome.orientation_applied);
    }

    #[test]
    fn injector_is_one_shot() {
        let injector = CaptureInjector::new();
        let host = injector.clone();
        assert!(!injector.is_pending());
        host.inject(None);
        assert!(injector.is_pending());
        assert!(injector.take().unwrap().image.is_none());
        assert!(injector.take().is_none());
    }
}
