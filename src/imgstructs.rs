//! Configuration and core value types shared by the signature pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::{Result, SignatureError};

/// Number of grid points per axis (9 -> 9x9 grid)
pub const DEFAULT_GRID_POINT_NUM: usize = 9;
/// Neighbours compared per grid point
pub const NEIGHBOUR_COUNT: usize = 8;
/// Differences below this are treated as identical brightness
pub const DEFAULT_IDENTICAL_TOLERANCE: f64 = 2.0 / 255.0;
/// Positive/negative strata. 2 -> [-2, -1, 0, 1, 2]
pub const DEFAULT_LEVEL: i32 = 2;
/// Largest accepted number of strata
pub const MAX_LEVEL: i32 = 255;
/// Width of one word in signature entries
pub const DEFAULT_WORD_WIDTH: usize = 16;
/// Words cut from each signature
pub const DEFAULT_WORD_NUMBER: usize = 63;
/// Widest word whose base-3 encoding still fits a `u64`
pub const MAX_WORD_WIDTH: usize = 40;

// ==============================================
// Gray calculation
// ==============================================

/// Strategy turning one RGBA pixel into a luminance value.
///
/// Implemented for every `Fn(u8, u8, u8, u8) -> f64`, so plain functions and
/// closures can be dropped into [`SignatureOptions::gray_calculator`].
pub trait GrayCalculator: Send + Sync {
    /// Luminance of one pixel
    fn gray(&self, r: u8, g: u8, b: u8, a: u8) -> f64;
}

impl<F> GrayCalculator for F
where
    F: Fn(u8, u8, u8, u8) -> f64 + Send + Sync,
{
    #[inline]
    fn gray(&self, r: u8, g: u8, b: u8, a: u8) -> f64 {
        self(r, g, b, a)
    }
}

/// Default luminance: Rec. 709 weights, normalized to 0..1 for opaque pixels.
///
/// Translucent pixels are blended against a background of `1` on the raw
/// 0..255 channel scale and are not normalized afterwards, so their gray
/// values live on a different scale than opaque ones.
pub fn default_gray(r: u8, g: u8, b: u8, a: u8) -> f64 {
    if a == 255 {
        return (0.2125 * r as f64 + 0.7154 * g as f64 + 0.0721 * b as f64) / 255.0;
    }

    let background = 1.0;
    let alpha = a as f64 / 255.0;

    let red = background * (1.0 - alpha) + r as f64 * alpha;
    let green = background * (1.0 - alpha) + g as f64 * alpha;
    let blue = background * (1.0 - alpha) + b as f64 * alpha;

    0.2125 * red + 0.7154 * green + 0.0721 * blue
}

// ==============================================
// Signature options
// ==============================================

/// Options for one signing session.
#[derive(Clone)]
pub struct SignatureOptions {
    /// Grid points per axis; the grid has `grid_point_num²` points
    pub grid_point_num: usize,
    /// `(lower, upper)` percentiles kept on both axes before sampling
    pub crop_percentiles: (u8, u8),
    /// Neighbour differences below this are considered identical
    pub identical_tolerance: f64,
    /// Number of positive and negative brightness strata
    pub level: i32,
    /// Replace each pixel by the mean of its 3x3 block
    pub use_average_pixel: bool,
    /// RGBA -> luminance strategy
    pub gray_calculator: Arc<dyn GrayCalculator>,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            grid_point_num: DEFAULT_GRID_POINT_NUM,
            crop_percentiles: (0, 100),
            identical_tolerance: DEFAULT_IDENTICAL_TOLERANCE,
            level: DEFAULT_LEVEL,
            use_average_pixel: false,
            gray_calculator: Arc::new(default_gray),
        }
    }
}

impl fmt::Debug for SignatureOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureOptions")
            .field("grid_point_num", &self.grid_point_num)
            .field("crop_percentiles", &self.crop_percentiles)
            .field("identical_tolerance", &self.identical_tolerance)
            .field("level", &self.level)
            .field("use_average_pixel", &self.use_average_pixel)
            .finish_non_exhaustive()
    }
}

impl SignatureOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Default options with a percentile crop, e.g. `(5, 95)`
    pub fn with_crop(lower: u8, upper: u8) -> Self {
        Self {
            crop_percentiles: (lower, upper),
            ..Self::default()
        }
    }

    /// Replace the gray calculator
    pub fn with_gray_calculator<G>(mut self, calculator: G) -> Self
    where
        G: GrayCalculator + 'static,
    {
        self.gray_calculator = Arc::new(calculator);
        self
    }

    /// Length of every signature produced with these options
    pub fn signature_len(&self) -> usize {
        self.grid_point_num * self.grid_point_num * NEIGHBOUR_COUNT
    }

    /// Whether the crop step changes the image at all
    pub fn crops(&self) -> bool {
        self.crop_percentiles != (0, 100)
    }

    /// Reject option values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.grid_point_num == 0 {
            return Err(SignatureError::InvalidParameter {
                name: "grid_point_num",
                message: "grid must have at least one point per axis".into(),
            });
        }
        if !(1..=MAX_LEVEL).contains(&self.level) {
            return Err(SignatureError::InvalidParameter {
                name: "level",
                message: format!("level must be between 1 and {MAX_LEVEL}, got {}", self.level),
            });
        }
        if !self.identical_tolerance.is_finite() || self.identical_tolerance < 0.0 {
            return Err(SignatureError::InvalidParameter {
                name: "identical_tolerance",
                message: format!(
                    "tolerance must be a finite non-negative number, got {}",
                    self.identical_tolerance
                ),
            });
        }
        let (lower, upper) = self.crop_percentiles;
        if lower >= upper || upper > 100 {
            return Err(SignatureError::InvalidParameter {
                name: "crop_percentiles",
                message: format!("expected 0 <= lower < upper <= 100, got ({lower}, {upper})"),
            });
        }
        Ok(())
    }
}

// ==============================================
// Store configuration
// ==============================================

/// Configuration of a [`crate::SignatureStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Entries per word
    pub word_width: usize,
    /// Words per signature
    pub word_number: usize,
    /// Matches must be strictly below this distance
    pub match_threshold: f64,
    /// Options used for every signature the store computes
    pub signature: SignatureOptions,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            word_width: DEFAULT_WORD_WIDTH,
            word_number: DEFAULT_WORD_NUMBER,
            match_threshold: crate::imgcomparator::DEFAULT_MATCH_THRESHOLD,
            signature: SignatureOptions::default(),
        }
    }
}

impl StoreConfig {
    /// Default word layout with custom signature options
    pub fn with_signature(signature: SignatureOptions) -> Self {
        Self {
            signature,
            ..Self::default()
        }
    }
}

// ==============================================
// Signature vector
// ==============================================

/// Quantized neighbour-difference levels of one image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(Vec<i32>);

impl Signature {
    /// Wrap raw levels
    pub fn new(levels: Vec<i32>) -> Self {
        Self(levels)
    }

    /// Underlying levels
    pub fn as_slice(&self) -> &[i32] {
        &self.0
    }

    /// Consume into the raw levels
    pub fn into_inner(self) -> Vec<i32> {
        self.0
    }

    /// True when every level is 0 (flat images)
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0)
    }
}

impl Deref for Signature {
    type Target = [i32];

    fn deref(&self) -> &[i32] {
        &self.0
    }
}

impl AsRef<[i32]> for Signature {
    fn as_ref(&self) -> &[i32] {
        &self.0
    }
}

impl From<Vec<i32>> for Signature {
    fn from(levels: Vec<i32>) -> Self {
        Self(levels)
    }
}

impl From<Signature> for Vec<i32> {
    fn from(signature: Signature) -> Self {
        signature.0
    }
}
