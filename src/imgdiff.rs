//! Neighbour differences between grid averages and their quantization into
//! signature levels.

use crate::imgshared::{linspace, percentiles};
use crate::imgstructs::{Signature, SignatureOptions, NEIGHBOUR_COUNT};
use crate::Result;

#[cfg(feature = "trace_signature")]
use tracing::trace;

#[cfg(not(feature = "trace_signature"))]
#[macro_use]
mod trace_stubs {
    macro_rules! trace {
        ($($arg:tt)*) => { std::convert::identity(format_args!($($arg)*)) };
    }
}

#[cfg(not(feature = "trace_signature"))]
use trace_stubs::*;

/// `(row, column)` offsets of the 8 neighbours, in output order.
pub const NEIGHBOUR_OFFSETS: [(i64, i64); NEIGHBOUR_COUNT] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Turns grid brightness averages into a [`Signature`].
#[derive(Debug)]
pub struct DifferenceEncoder<'a> {
    options: &'a SignatureOptions,
}

impl<'a> DifferenceEncoder<'a> {
    /// Encoder using the grid size, tolerance and level of `options`.
    ///
    /// Fails with [`crate::SignatureError::InvalidParameter`] when the options
    /// do not validate.
    pub fn new(options: &'a SignatureOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Differences plus quantization in one step.
    pub fn encode(&self, averages: &[f64]) -> Result<Signature> {
        let differences = self.neighbour_differences(averages);
        self.brightness_levels(&differences)
    }

    /// `self - neighbour` for each grid point and each of its 8 neighbours.
    ///
    /// Neighbours outside the grid produce exactly `0.0` but keep their slot,
    /// so the output is always `n * n * 8` long.
    pub fn neighbour_differences(&self, averages: &[f64]) -> Vec<f64> {
        let n = self.options.grid_point_num as i64;
        let mut differences = Vec::with_capacity((n * n) as usize * NEIGHBOUR_COUNT);

        for x in 0..n {
            for y in 0..n {
                let base = averages.get((x * n + y) as usize).copied().unwrap_or(0.0);

                for &(dx, dy) in NEIGHBOUR_OFFSETS.iter() {
                    let nx = x + dx;
                    let ny = y + dy;
                    let diff = if nx < 0 || nx >= n || ny < 0 || ny >= n {
                        0.0
                    } else {
                        averages
                            .get((nx * n + ny) as usize)
                            .map_or(0.0, |neighbour| base - neighbour)
                    };
                    differences.push(diff);
                }
            }
        }

        differences
    }

    /// Quantize raw differences into `[-level, level]`.
    ///
    /// Differences within the tolerance become 0. The rest are split into a
    /// light and a dark set and ranked against `level + 1` percentile cutoffs
    /// of their own set. When either set is empty the whole signature is 0.
    pub fn brightness_levels(&self, differences: &[f64]) -> Result<Signature> {
        let tolerance = self.options.identical_tolerance;
        let level = self.options.level;

        let mut darks = Vec::new();
        let mut lights = Vec::new();
        for &d in differences {
            if d.abs() < tolerance {
                continue;
            }
            if d <= -tolerance {
                darks.push(d);
            } else if d >= tolerance {
                lights.push(d);
            }
        }

        let mut levels = vec![0i32; differences.len()];
        if darks.is_empty() || lights.is_empty() {
            trace!(
                "flat signature: {} dark, {} light differences",
                darks.len(),
                lights.len()
            );
            return Ok(Signature::new(levels));
        }

        let targets = level as usize + 1;
        let light_cutoffs = percentiles(&lights, &linspace(0.0, 1.0, targets, true))?;
        let dark_cutoffs = percentiles(&darks, &linspace(1.0, 0.0, targets, true))?;
        trace!("light cutoffs {:?}, dark cutoffs {:?}", light_cutoffs, dark_cutoffs);

        for (slot, &d) in levels.iter_mut().zip(differences) {
            *slot = if d >= -tolerance && d <= tolerance {
                0
            } else if d > 0.0 {
                light_level(d, &light_cutoffs)
            } else {
                dark_level(d, &dark_cutoffs)
            };
        }

        Ok(Signature::new(levels))
    }
}

fn light_level(diff: f64, cutoffs: &[f64]) -> i32 {
    cutoffs
        .windows(2)
        .position(|w| diff >= w[0] && diff <= w[1])
        .map_or(0, |i| i as i32 + 1)
}

fn dark_level(diff: f64, cutoffs: &[f64]) -> i32 {
    cutoffs
        .windows(2)
        .position(|w| diff <= w[0] && diff >= w[1])
        .map_or(0, |i| -(i as i32 + 1))
}
