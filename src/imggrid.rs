//! Grid sampling: where the signature looks, and how bright it is there.
//!
//! Coordinates follow the pixel buffer's memory order: `x` is the row
//! (bounded by the height) and `y` the column (bounded by the width).

use crate::imgbuffer::{PixelBuffer, Rgba};
use crate::imgstructs::SignatureOptions;
use crate::Result;

/// Centre of one sampling square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridPoint {
    /// Row coordinate
    pub x: i64,
    /// Column coordinate
    pub y: i64,
}

/// `n * n` evenly spaced grid points, row-major.
///
/// Rows sit at `trunc(height / (n + 1) * (row + 1))`, columns at
/// `trunc(width / (n + 1) * (col + 1))`.
pub fn compute_grid_points(width: usize, height: usize, grid_point_num: usize) -> Vec<GridPoint> {
    let row_offset = height as f64 / (grid_point_num as f64 + 1.0);
    let col_offset = width as f64 / (grid_point_num as f64 + 1.0);

    let mut coords = Vec::with_capacity(grid_point_num * grid_point_num);
    for row in 0..grid_point_num {
        for col in 0..grid_point_num {
            coords.push(GridPoint {
                x: (row_offset * (row + 1) as f64) as i64,
                y: (col_offset * (col + 1) as f64) as i64,
            });
        }
    }
    coords
}

/// Side of the sampling square: 5% of the shorter edge, at least 2 pixels.
pub fn square_size(width: usize, height: usize) -> i64 {
    let side = (width.min(height) as f64 / 20.0).round_ties_even();
    side.max(2.0) as i64
}

/// Averages gray values around grid points of one pixel buffer.
pub struct GridSampler<'a> {
    pixels: &'a [Rgba],
    width: i64,
    height: i64,
    options: &'a SignatureOptions,
}

impl<'a> GridSampler<'a> {
    /// Borrow a buffer for sampling; fails if it is not contiguous or the
    /// options do not validate.
    pub fn new(buffer: &'a PixelBuffer, options: &'a SignatureOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            pixels: buffer.as_slice()?,
            width: buffer.width() as i64,
            height: buffer.height() as i64,
            options,
        })
    }

    /// Average brightness of the square around every grid point, in grid
    /// order.
    pub fn average_brightness(&self) -> Vec<f64> {
        let n = self.options.grid_point_num;
        let side = square_size(self.width as usize, self.height as usize);

        compute_grid_points(self.width as usize, self.height as usize, n)
            .into_iter()
            .map(|point| self.square_average(point, side))
            .collect()
    }

    /// Mean gray of the `side x side` square centred on `center`.
    ///
    /// Pixels outside the image are skipped but the divisor stays `side²`,
    /// so squares clipped by the border come out darker. The row test allows
    /// `x == height` and the column test `y == width`; such coordinates are
    /// resolved through the flat index and dropped if it runs off the buffer.
    pub fn square_average(&self, center: GridPoint, side: i64) -> f64 {
        let half = side as f64 / 2.0;
        let corner_x = (center.x as f64 - half).round_ties_even() as i64;
        let corner_y = (center.y as f64 - half).round_ties_even() as i64;

        let mut sum = 0.0;
        for x in corner_x..corner_x + side {
            if x > self.height || x < 0 {
                continue;
            }
            for y in corner_y..corner_y + side {
                if y > self.width || y < 0 {
                    continue;
                }
                sum += self.pixel_gray(x, y);
            }
        }

        sum / (side * side) as f64
    }

    /// Gray value at row `x`, column `y`, optionally smoothed over 3x3.
    pub fn pixel_gray(&self, x: i64, y: i64) -> f64 {
        if !self.options.use_average_pixel {
            return self.gray_at(x * self.width + y);
        }

        // The neighbourhood bounds compare the column against the height and
        // the row against the width. Always divided by 9.
        let mut sum = 0.0;
        for y_offset in 0..3 {
            let col = y - 1 + y_offset;
            if col > self.height - 1 || col < 0 {
                continue;
            }
            for x_offset in 0..3 {
                let row = x - 1 + x_offset;
                if row > self.width - 1 || row < 0 {
                    continue;
                }
                sum += self.gray_at(col + row * self.width);
            }
        }

        sum / 9.0
    }

    fn gray_at(&self, flat_index: i64) -> f64 {
        if flat_index < 0 {
            return 0.0;
        }
        match self.pixels.get(flat_index as usize) {
            Some(p) => self.options.gray_calculator.gray(p.r, p.g, p.b, p.a),
            None => 0.0,
        }
    }
}
