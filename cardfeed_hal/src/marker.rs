//! QR orientation-marker location.
//!
//! Used by the GPIO camera driver. The region is converted to greyscale and
//! handed to `rqrr`; the first grid that decodes wins.

use cardfeed_common::hal::types::{DynamicImage, MarkerLocation};
use tracing::{debug, trace};

/// Locate and decode a QR code within `region`.
///
/// Returns the centre of the code's bounding quadrilateral, in region pixels,
/// and the decoded content. Grids that are detected but fail to decode are
/// skipped.
pub fn locate_qr(region: &DynamicImage) -> Option<MarkerLocation> {
    let luma = region.to_luma8();
    let (width, height) = luma.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(width as usize, height as usize, |x, y| {
            luma.get_pixel(x as u32, y as u32).0[0]
        });
    let grids = prepared.detect_grids();
    trace!("{} candidate grids in {}x{} region", grids.len(), width, height);

    for grid in grids {
        match grid.decode() {
            Ok((_meta, payload)) => {
                let (sum_x, sum_y) = grid
                    .bounds
                    .iter()
                    .fold((0i64, 0i64), |(sx, sy), p| (sx + p.x as i64, sy + p.y as i64));
                let x = (sum_x / 4).clamp(0, width as i64 - 1) as u32;
                let y = (sum_y / 4).clamp(0, height as i64 - 1) as u32;
                debug!("Marker {:?} at ({}, {})", payload, x, y);
                return Some(MarkerLocation { x, y, payload });
            }
            Err(e) => debug!("Grid found but not decodable: {}", e),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn blank_region_has_no_marker() {
        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([255])));
        assert!(locate_qr(&blank).is_none());
    }

    #[test]
    fn empty_region_has_no_marker() {
        let empty = DynamicImage::ImageLuma8(GrayImage::new(0, 0));
        assert!(locate_qr(&empty).is_none());
    }

    #[test]
    fn dark_square_is_not_a_marker() {
        let mut img = GrayImage::from_pixel(64, 64, Luma([255]));
        for y in 16..48 {
            for x in 16..48 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        assert!(locate_qr(&DynamicImage::ImageLuma8(img)).is_none());
    }
}
