//! Percentile cropping and quarter-turn rotations applied before sampling.

use ndarray::{s, Axis};

use crate::imgbuffer::PixelBuffer;
use crate::Result;

/// Quarter-turn rotations, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// Unrotated
    Deg0,
    /// Quarter turn
    Deg90,
    /// Half turn
    Deg180,
    /// Three quarter turns
    Deg270,
}

impl Orientation {
    /// Search order of the orientation passes.
    pub const ALL: [Orientation; 4] = [
        Orientation::Deg0,
        Orientation::Deg90,
        Orientation::Deg180,
        Orientation::Deg270,
    ];

    /// Rotation angle in degrees
    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 90,
            Orientation::Deg180 => 180,
            Orientation::Deg270 => 270,
        }
    }
}

/// Rotate clockwise by `orientation` into a new buffer.
pub fn rotate(image: &PixelBuffer, orientation: Orientation) -> Result<PixelBuffer> {
    let mut view = image.view();
    match orientation {
        Orientation::Deg0 => {}
        Orientation::Deg90 => {
            // out[r][c] = in[h - 1 - c][r]
            view = view.reversed_axes();
            view.invert_axis(Axis(1));
        }
        Orientation::Deg180 => {
            view.invert_axis(Axis(0));
            view.invert_axis(Axis(1));
        }
        Orientation::Deg270 => {
            // out[r][c] = in[c][w - 1 - r]
            view = view.reversed_axes();
            view.invert_axis(Axis(0));
        }
    }
    PixelBuffer::from_view(view)
}

/// Pixel range `[start, end)` kept along an axis of `len` pixels.
///
/// Never empty: at least one pixel survives even for degenerate bounds.
pub fn crop_bounds(len: usize, lower: u8, upper: u8) -> (usize, usize) {
    let start = ((len * lower as usize) as f64 / 100.0) as usize;
    let end = ((len * upper as usize) as f64 / 100.0) as usize;
    let start = start.min(len.saturating_sub(1));
    let end = end.clamp(start + 1, len);
    (start, end)
}

/// Keep the `(lower, upper)` percentile window on both axes.
///
/// `(0, 100)` hands back an unchanged copy.
pub fn crop(image: &PixelBuffer, (lower, upper): (u8, u8)) -> Result<PixelBuffer> {
    if (lower, upper) == (0, 100) {
        return Ok(image.clone());
    }

    let (row_start, row_end) = crop_bounds(image.height(), lower, upper);
    let (col_start, col_end) = crop_bounds(image.width(), lower, upper);

    let view = image.view();
    PixelBuffer::from_view(view.slice(s![row_start..row_end, col_start..col_end]))
}
