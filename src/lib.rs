//! Perceptual image signatures in Rust
//!
//! This crate computes a fixed-length brightness-contrast signature from an
//! RGBA pixel buffer, compares signatures for near-duplicate detection, and
//! turns a signature into integer "words" that can be stored as terms in an
//! inverted index. [`SignatureStore`] ties signing, word indexing and
//! candidate re-ranking together over any [`SignatureStorage`] backend.
//!
//! ```no_run
//! use imgmatch_rust::{ImageSignature, PixelBuffer, normalized_distance};
//!
//! # fn demo(a: &[u8], b: &[u8]) -> Result<(), imgmatch_rust::SignatureError> {
//! let generator = ImageSignature::default();
//! let left = generator.generate(&PixelBuffer::from_rgba(64, 64, a)?)?;
//! let right = generator.generate(&PixelBuffer::from_rgba(64, 64, b)?)?;
//! println!("distance = {}", normalized_distance(&left, &right));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

use thiserror::Error;

/// Errors that can occur while building, comparing or indexing signatures
#[derive(Error, Debug)]
pub enum SignatureError {
    /// Raw RGBA buffer does not hold exactly `width * height` pixels
    #[error("Input buffer size mismatch: expected {expected} bytes, got {actual} for {width}x{height} RGBA image")]
    BufferSizeMismatch {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
    },

    /// Image has a zero dimension
    #[error("Image must have non-zero dimensions, got {width}x{height}")]
    EmptyImage { width: usize, height: usize },

    /// Pixel array is not laid out row-major and contiguous
    #[error("The backing buffer for the image was not contiguous")]
    NonContiguous,

    /// Array shape error during conversion
    #[error("Array shape error")]
    ArrayShape {
        #[from]
        source: ndarray::ShapeError,
    },

    /// Option or argument outside its valid range
    #[error("Invalid parameter `{name}`: {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// Word is wider than the signature it is cut from
    #[error("Word length cannot be longer than array length ({word_width} > {signature_len})")]
    WordWidthTooLarge {
        word_width: usize,
        signature_len: usize,
    },

    /// More word start positions than signature entries
    #[error("Number of words cannot be more than array length ({word_number} > {signature_len})")]
    TooManyWords {
        word_number: usize,
        signature_len: usize,
    },

    /// Percentile requested over an empty collection
    #[error("Percentile source contains no elements")]
    EmptyPercentileInput,

    /// Record key is empty or whitespace
    #[error("Record key must not be empty")]
    EmptyKey,
}

/// Result alias used throughout the signature pipeline
pub type Result<T> = std::result::Result<T, SignatureError>;

// Module declarations
pub mod imgbuffer;
pub mod imgcomparator;
pub mod imgdiff;
pub mod imggrid;
pub mod imgmemory;
pub mod imgorient;
pub mod imgshared;
pub mod imgsig;
pub mod imgstore;
pub mod imgstructs;
pub mod imgwords;

// Re-export the main entry points and config
pub use imgbuffer::{PixelBuffer, Rgba};
pub use imgcomparator::{is_match, normalized_distance, DEFAULT_MATCH_THRESHOLD};
pub use imgmemory::MemoryStorage;
pub use imgorient::Orientation;
pub use imgsig::ImageSignature;
pub use imgstore::{
    MatchRecord, SignatureRecord, SignatureStorage, SignatureStore, StoreError,
};
pub use imgstructs::{default_gray, GrayCalculator, Signature, SignatureOptions, StoreConfig};
pub use imgwords::{make_simple_words, WordTerm};

/// Get the version string for the crate
pub fn get_version() -> String {
    let signature_version = option_env!("IMGMATCH_SIGNATURE_VERSION").unwrap_or("unknown");
    format!(
        "imgmatch-rs {}, signature format {}",
        env!("CARGO_PKG_VERSION"),
        signature_version
    )
}

/// Get the build information string
pub fn get_build_info() -> String {
    let build_ts = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown");
    let build_type = if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    };
    format!("{} (built with {})", build_ts, build_type)
}
