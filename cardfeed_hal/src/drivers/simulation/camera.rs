//! Simulated camera.
//!
//! Renders a white frame with a dark square standing in for the orientation
//! marker. Where the square is painted is controlled through `CameraHandle`,
//! so tests can exercise upright, upside-down and unreadable cards.

use cardfeed_common::control_unit::config::{CaptureConfig, Region};
use cardfeed_common::hal::driver::{CaptureDevice, HalError};
use cardfeed_common::hal::types::{DynamicImage, MarkerLocation};
use image::{GrayImage, Luma};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Frame size of the simulated camera.
pub const SIM_FRAME_WIDTH: u32 = 320;
/// Frame size of the simulated camera.
pub const SIM_FRAME_HEIGHT: u32 = 240;

/// Payload reported for a located simulated marker.
pub const SIM_MARKER_PAYLOAD: &str = "sim-marker";

const MARKER_SIDE: u32 = 24;
const DARK_THRESHOLD: u8 = 64;

/// Where the next frames show the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkerPlacement {
    /// In the near region: card inserted upside down.
    Near,
    /// In the far region: card upright.
    #[default]
    Far,
    /// Nowhere: unreadable card.
    Absent,
}

#[derive(Debug)]
struct CameraState {
    placement: MarkerPlacement,
    pending_fault: Option<String>,
    captures: u32,
    illuminated: bool,
}

/// Simulated still camera.
#[derive(Debug)]
pub struct SimCamera {
    regions: CaptureConfig,
    state: Arc<Mutex<CameraState>>,
}

impl SimCamera {
    /// Camera painting markers into the given capture regions.
    pub fn new(regions: CaptureConfig) -> Self {
        Self {
            regions,
            state: Arc::new(Mutex::new(CameraState {
                placement: MarkerPlacement::default(),
                pending_fault: None,
                captures: 0,
                illuminated: false,
            })),
        }
    }

    /// Test-side handle.
    pub fn handle(&self) -> CameraHandle {
        CameraHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn render(&self, placement: MarkerPlacement) -> GrayImage {
        let mut frame = GrayImage::from_pixel(SIM_FRAME_WIDTH, SIM_FRAME_HEIGHT, Luma([255]));
        let region = match placement {
            MarkerPlacement::Near => Some(self.regions.near),
            MarkerPlacement::Far => Some(self.regions.far),
            MarkerPlacement::Absent => None,
        };
        if let Some(region) = region {
            paint_marker(&mut frame, &region);
        }
        frame
    }
}

/// Dark square centred in `region`, shrunk to fit.
fn paint_marker(frame: &mut GrayImage, region: &Region) {
    let (rx, ry, rw, rh) = region.to_pixels(frame.width(), frame.height());
    let side = MARKER_SIDE.min(rw).min(rh);
    let x0 = rx + (rw - side) / 2;
    let y0 = ry + (rh - side) / 2;
    for y in y0..y0 + side {
        for x in x0..x0 + side {
            frame.put_pixel(x, y, Luma([0]));
        }
    }
}

impl CaptureDevice for SimCamera {
    fn capture_still(&mut self) -> Result<DynamicImage, HalError> {
        let placement = {
            let mut state = self.state.lock();
            if let Some(reason) = state.pending_fault.take() {
                return Err(HalError::CaptureFailed(reason));
            }
            state.captures += 1;
            state.placement
        };
        debug!("sim: capture with marker {:?}", placement);
        Ok(DynamicImage::ImageLuma8(self.render(placement)))
    }

    /// Centroid of the dark pixels, if any.
    fn locate_marker(&self, region: &DynamicImage) -> Option<MarkerLocation> {
        let luma = region.to_luma8();
        let (mut sum_x, mut sum_y, mut count) = (0u64, 0u64, 0u64);
        for (x, y, pixel) in luma.enumerate_pixels() {
            if pixel.0[0] < DARK_THRESHOLD {
                sum_x += u64::from(x);
                sum_y += u64::from(y);
                count += 1;
            }
        }
        (count > 0).then(|| MarkerLocation {
            x: (sum_x / count) as u32,
            y: (sum_y / count) as u32,
            payload: SIM_MARKER_PAYLOAD.to_string(),
        })
    }

    fn set_illumination(&mut self, on: bool) -> Result<(), HalError> {
        self.state.lock().illuminated = on;
        Ok(())
    }
}

/// Test and console access to the simulated camera.
#[derive(Debug, Clone)]
pub struct CameraHandle {
    state: Arc<Mutex<CameraState>>,
}

impl CameraHandle {
    /// Choose where subsequent frames show the marker.
    pub fn set_marker(&self, placement: MarkerPlacement) {
        self.state.lock().placement = placement;
    }

    /// Fail the next capture.
    pub fn fail_next_capture(&self, reason: &str) {
        self.state.lock().pending_fault = Some(reason.to_string());
    }

    /// Number of successful captures so far.
    pub fn captures(&self) -> u32 {
        self.state.lock().captures
    }

    /// Whether the illumination is on.
    pub fn illuminated(&self) -> bool {
        self.state.lock().illuminated
    }
}
