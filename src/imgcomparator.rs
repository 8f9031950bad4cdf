//! imgcomparator.rs
//! ==========================================================
//! Normalized Euclidean distance between two signatures.
//!
//! `dist(a, b) = |b - a| / (|a| + |b|)`. Identical signatures score 0,
//! exact negations score 1, unrelated images usually land around 0.6-0.8.
//! ==========================================================

/// Distances strictly below this count as a match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.4;

/// Euclidean length of a level vector.
pub fn euclidean_length(levels: &[i32]) -> f64 {
    levels
        .iter()
        .map(|&v| {
            let v = v as f64;
            v * v
        })
        .sum::<f64>()
        .sqrt()
}

/// Length of `b - a`; tail entries of the longer vector pass through unchanged.
fn difference_length(a: &[i32], b: &[i32]) -> f64 {
    let longest = a.len().max(b.len());
    (0..longest)
        .map(|i| {
            let left = a.get(i).copied().unwrap_or(0) as f64;
            let right = b.get(i).copied().unwrap_or(0) as f64;
            let d = right - left;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Normalized distance between two signatures, roughly in `[0, 1]`.
///
/// Two all-zero signatures are at distance exactly 0.
pub fn normalized_distance(a: &[i32], b: &[i32]) -> f64 {
    let combined = euclidean_length(a) + euclidean_length(b);
    if combined == 0.0 {
        return 0.0;
    }
    difference_length(a, b) / combined
}

/// `normalized_distance(a, b) < 0.4`
pub fn is_match(a: &[i32], b: &[i32]) -> bool {
    is_match_with(a, b, DEFAULT_MATCH_THRESHOLD)
}

/// Match predicate with a caller-chosen threshold.
pub fn is_match_with(a: &[i32], b: &[i32], threshold: f64) -> bool {
    normalized_distance(a, b) < threshold
}

/// Distance from `signature` to each of `targets`, in order.
pub fn normalized_distances<T: AsRef<[i32]>>(signature: &[i32], targets: &[T]) -> Vec<f64> {
    targets
        .iter()
        .map(|t| normalized_distance(signature, t.as_ref()))
        .collect()
}
