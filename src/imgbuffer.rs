//! RGBA pixel buffers handed to the signature pipeline.
//!
//! Decoding files into pixels happens elsewhere; this module only validates
//! and wraps already-decoded RGBA data.

use ndarray::{Array2, ArrayView2};

use crate::{Result, SignatureError};

/// One RGBA pixel, 0..255 per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
    /// Alpha, 255 is opaque
    pub a: u8,
}

impl Rgba {
    /// Build a pixel from its four channels
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Fully opaque pixel
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

impl From<[u8; 4]> for Rgba {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}

/// Decoded image, `height` rows of `width` pixels in row-major order.
///
/// The backing array is always in standard (contiguous, row-major) layout:
/// the grid sampler indexes it as a flat slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pixels: Array2<Rgba>,
}

impl PixelBuffer {
    /// Wrap a raw `width * height * 4` byte RGBA buffer.
    pub fn from_rgba(width: u32, height: u32, data: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(SignatureError::BufferSizeMismatch {
                expected,
                actual: data.len(),
                width,
                height,
            });
        }

        let pixels: Vec<Rgba> = data
            .chunks_exact(4)
            .map(|px| Rgba::new(px[0], px[1], px[2], px[3]))
            .collect();

        Self::from_pixels(width as usize, height as usize, pixels)
    }

    /// Wrap a row-major pixel vector.
    pub fn from_pixels(width: usize, height: usize, pixels: Vec<Rgba>) -> Result<Self> {
        let array = Array2::from_shape_vec((height, width), pixels)?;
        Self::from_array(array)
    }

    /// Wrap an existing `(height, width)` array.
    ///
    /// Arrays that are not in standard layout (e.g. transposed or
    /// reversed without copying) are rejected.
    pub fn from_array(pixels: Array2<Rgba>) -> Result<Self> {
        let (height, width) = pixels.dim();
        if width == 0 || height == 0 {
            return Err(SignatureError::EmptyImage { width, height });
        }
        if !pixels.is_standard_layout() {
            return Err(SignatureError::NonContiguous);
        }
        Ok(Self { pixels })
    }

    /// Copy any 2D pixel view into a fresh standard-layout buffer.
    pub(crate) fn from_view(view: ArrayView2<'_, Rgba>) -> Result<Self> {
        let copied = Array2::from_shape_fn(view.raw_dim(), |idx| view[idx]);
        Self::from_array(copied)
    }

    /// Build a buffer by evaluating `f(x, y)` for every pixel.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Result<Self>
    where
        F: FnMut(usize, usize) -> Rgba,
    {
        let array = Array2::from_shape_fn((height, width), |(y, x)| f(x, y));
        Self::from_array(array)
    }

    /// Single-colour buffer
    pub fn filled(width: usize, height: usize, pixel: Rgba) -> Result<Self> {
        Self::from_array(Array2::from_elem((height, width), pixel))
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.pixels.ncols()
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.pixels.nrows()
    }

    /// Pixel at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> Option<Rgba> {
        self.pixels.get((y, x)).copied()
    }

    /// 2D view, indexed `(row, column)`
    pub fn view(&self) -> ArrayView2<'_, Rgba> {
        self.pixels.view()
    }

    /// Flat row-major pixel slice.
    pub fn as_slice(&self) -> Result<&[Rgba]> {
        self.pixels.as_slice().ok_or(SignatureError::NonContiguous)
    }

    /// Flatten back into raw RGBA bytes
    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| [p.r, p.g, p.b, p.a])
            .collect()
    }
}
