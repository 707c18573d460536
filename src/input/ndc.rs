//! Pixel to normalized-device-coordinate conversion for the video
//! surface.
//!
//! NDC coordinates range from -1 to 1 on both axes with (0,0) at the
//! center. Absolute points invert Y so that positive Y is up; deltas are
//! scaled only, without inversion, matching the drag math of the paired
//! web frontend.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NdcError {
    #[error("Surface extent must be positive, got {width}x{height}")]
    InvalidExtent { width: i32, height: i32 },
}

/// Conversion space for one video surface size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NdcSpace {
    width: f64,
    height: f64,
}

impl NdcSpace {
    pub fn new(width: i32, height: i32) -> Result<Self, NdcError> {
        if width <= 0 || height <= 0 {
            return Err(NdcError::InvalidExtent { width, height });
        }
        Ok(Self {
            width: width as f64,
            height: height as f64,
        })
    }

    /// Absolute pixel position to NDC, Y inverted and clamped to [-1, 1].
    pub fn point_to_ndc(&self, x: i32, y: i32) -> (f64, f64) {
        let ndc_x = (x as f64 / self.width) * 2.0 - 1.0;
        let ndc_y = -((y as f64 / self.height) * 2.0 - 1.0);
        (ndc_x.clamp(-1.0, 1.0), ndc_y.clamp(-1.0, 1.0))
    }

    /// Pixel displacement to NDC displacement. No inversion, no clamping:
    /// a drag can legitimately cover more than the half-extent.
    pub fn delta_to_ndc(&self, dx: i32, dy: i32) -> (f64, f64) {
        (
            dx as f64 * 2.0 / self.width,
            dy as f64 * 2.0 / self.height,
        )
    }
}
