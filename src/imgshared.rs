//! Numeric helpers shared by the difference encoder and the word indexer

use crate::{Result, SignatureError};

// ==============================================
// Linear spaces
// ==============================================

/// `num` evenly spaced values from `start` towards `stop`.
///
/// With `endpoint` the last value is `stop`; without it the interval is split
/// into `num` steps and `stop` itself is left out.
pub fn linspace(start: f64, stop: f64, num: usize, endpoint: bool) -> Vec<f64> {
    let step = linspace_step(start, stop, num, endpoint);
    (0..num).map(|i| start + i as f64 * step).collect()
}

/// Like [`linspace`], truncating every value toward zero.
pub fn linspace_int(start: f64, stop: f64, num: usize, endpoint: bool) -> Vec<usize> {
    let step = linspace_step(start, stop, num, endpoint);
    (0..num).map(|i| (start + i as f64 * step) as usize).collect()
}

fn linspace_step(start: f64, stop: f64, num: usize, endpoint: bool) -> f64 {
    if endpoint {
        if num > 1 {
            (stop - start) / (num - 1) as f64
        } else {
            0.0
        }
    } else if num > 0 {
        (stop - start) / num as f64
    } else {
        0.0
    }
}

// ==============================================
// Percentiles
// ==============================================

/// Percentiles of `source` by linear interpolation between order statistics.
///
/// Each target `p` in `0.0..=1.0` maps to rank `n = (N - 1) * p + 1` over the
/// ascending samples; fractional ranks interpolate between neighbours.
pub fn percentiles(source: &[f64], targets: &[f64]) -> Result<Vec<f64>> {
    if source.is_empty() {
        return Err(SignatureError::EmptyPercentileInput);
    }

    let mut sorted = source.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    Ok(targets
        .iter()
        .map(|&p| interpolate_sorted(&sorted, p))
        .collect())
}

/// Single-target convenience over [`percentiles`].
pub fn percentile(source: &[f64], target: f64) -> Result<f64> {
    percentiles(source, &[target]).map(|v| v[0])
}

fn interpolate_sorted(sorted: &[f64], p: f64) -> f64 {
    let count = sorted.len();
    let rank = (count - 1) as f64 * p + 1.0;

    if rank <= 1.0 {
        sorted[0]
    } else if rank >= count as f64 {
        sorted[count - 1]
    } else {
        let k = rank as usize;
        let d = rank - k as f64;
        sorted[k - 1] + d * (sorted[k] - sorted[k - 1])
    }
}
