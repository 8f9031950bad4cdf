//! Common utility functions for integration tests
#![allow(dead_code)]

use imgmatch_rust::{PixelBuffer, Rgba};
use std::f64::consts::PI;

pub const SCENE_WIDTH: usize = 200;
pub const SCENE_HEIGHT: usize = 150;

fn to_channel(v: f64) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

fn gray_pixel(v: f64) -> Rgba {
    let g = to_channel(v);
    Rgba::opaque(g, g, g)
}

/// Smooth waves plus an off-centre bright blob, drawn in normalized
/// coordinates so any size renders the same picture.
pub fn scene(width: usize, height: usize) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |x, y| {
        let u = x as f64 / width as f64;
        let v = y as f64 / height as f64;
        let waves = 70.0 * (2.0 * PI * 1.5 * u).sin() * (2.0 * PI * v).cos();
        let blob = 50.0 * (-((u - 0.3).powi(2) + (v - 0.6).powi(2)) / 0.02).exp();
        gray_pixel(120.0 + waves + blob)
    })
    .unwrap()
}

/// Default-size scene
pub fn default_scene() -> PixelBuffer {
    scene(SCENE_WIDTH, SCENE_HEIGHT)
}

/// Concentric rings around the upper right; shares no structure with
/// [`scene`].
pub fn rings(width: usize, height: usize) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |x, y| {
        let u = x as f64 / width as f64;
        let v = y as f64 / height as f64;
        let r = (u - 0.7).hypot(v - 0.2);
        gray_pixel(128.0 + 100.0 * (2.0 * PI * 4.0 * r).cos())
    })
    .unwrap()
}

/// Add `delta` to every colour channel, clamped
pub fn brighten(image: &PixelBuffer, delta: i16) -> PixelBuffer {
    let shift = |c: u8| (c as i16 + delta).clamp(0, 255) as u8;
    PixelBuffer::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get(x, y).unwrap();
        Rgba::new(shift(p.r), shift(p.g), shift(p.b), p.a)
    })
    .unwrap()
}

/// Photographic negative, alpha untouched
pub fn invert(image: &PixelBuffer) -> PixelBuffer {
    PixelBuffer::from_fn(image.width(), image.height(), |x, y| {
        let p = image.get(x, y).unwrap();
        Rgba::new(255 - p.r, 255 - p.g, 255 - p.b, p.a)
    })
    .unwrap()
}

/// Halve both dimensions by averaging 2x2 blocks
pub fn downscale_half(image: &PixelBuffer) -> PixelBuffer {
    let mean = |vals: [u8; 4]| (vals.iter().map(|&v| v as u16).sum::<u16>() / 4) as u8;
    PixelBuffer::from_fn(image.width() / 2, image.height() / 2, |x, y| {
        let block = [
            image.get(2 * x, 2 * y).unwrap(),
            image.get(2 * x + 1, 2 * y).unwrap(),
            image.get(2 * x, 2 * y + 1).unwrap(),
            image.get(2 * x + 1, 2 * y + 1).unwrap(),
        ];
        Rgba::new(
            mean(block.map(|p| p.r)),
            mean(block.map(|p| p.g)),
            mean(block.map(|p| p.b)),
            mean(block.map(|p| p.a)),
        )
    })
    .unwrap()
}

/// Raw RGBA bytes of a solid colour image
pub fn solid_rgba(width: usize, height: usize, pixel: [u8; 4]) -> Vec<u8> {
    pixel
        .iter()
        .copied()
        .cycle()
        .take(width * height * 4)
        .collect()
}
