//! This module contains the main signature generator.
use crate::imgbuffer::PixelBuffer;
use crate::imgcomparator;
use crate::imgdiff::DifferenceEncoder;
use crate::imggrid::GridSampler;
use crate::imgorient::{crop, rotate, Orientation};
use crate::imgstructs::{Signature, SignatureOptions};
use crate::Result;

#[cfg(feature = "trace_signature")]
use tracing::{debug, trace};

#[cfg(not(feature = "trace_signature"))]
#[macro_use]
mod trace_stubs {
    macro_rules! debug {
        ($($arg:tt)*) => { std::convert::identity(format_args!($($arg)*)) };
    }
    macro_rules! trace {
        ($($arg:tt)*) => { std::convert::identity(format_args!($($arg)*)) };
    }
}

#[cfg(not(feature = "trace_signature"))]
use trace_stubs::*;

/// Computes perceptual signatures with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct ImageSignature {
    options: SignatureOptions,
}

impl ImageSignature {
    /// Generator with custom options.
    pub fn new(options: SignatureOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Options in use
    pub fn options(&self) -> &SignatureOptions {
        &self.options
    }

    /// Signature of one image: crop, sample the grid, encode differences.
    ///
    /// The result always has `grid_point_num² * 8` entries.
    pub fn generate(&self, image: &PixelBuffer) -> Result<Signature> {
        if self.options.crops() {
            let cropped = crop(image, self.options.crop_percentiles)?;
            trace!(
                "cropped {}x{} -> {}x{}",
                image.width(),
                image.height(),
                cropped.width(),
                cropped.height()
            );
            return self.generate_uncropped(&cropped);
        }
        self.generate_uncropped(image)
    }

    fn generate_uncropped(&self, image: &PixelBuffer) -> Result<Signature> {
        let sampler = GridSampler::new(image, &self.options)?;
        let averages = sampler.average_brightness();
        trace!("grid averages: {:?}", averages);

        let signature = DifferenceEncoder::new(&self.options)?.encode(&averages)?;
        debug!(
            "signed {}x{} image: {} levels, {} non-zero",
            image.width(),
            image.height(),
            signature.len(),
            signature.iter().filter(|&&v| v != 0).count()
        );
        Ok(signature)
    }

    /// Signature of the image rotated clockwise by `orientation`.
    pub fn generate_oriented(&self, image: &PixelBuffer, orientation: Orientation) -> Result<Signature> {
        match orientation {
            Orientation::Deg0 => self.generate(image),
            _ => self.generate(&rotate(image, orientation)?),
        }
    }

    /// One signature per quarter turn, in [`Orientation::ALL`] order.
    pub fn generate_all_orientations(&self, image: &PixelBuffer) -> Result<Vec<Signature>> {
        Orientation::ALL
            .iter()
            .map(|&orientation| self.generate_oriented(image, orientation))
            .collect()
    }

    /// See [`imgcomparator::normalized_distance`].
    pub fn normalized_distance(&self, a: &[i32], b: &[i32]) -> f64 {
        imgcomparator::normalized_distance(a, b)
    }

    /// See [`imgcomparator::is_match`].
    pub fn is_match(&self, a: &[i32], b: &[i32]) -> bool {
        imgcomparator::is_match(a, b)
    }
}
