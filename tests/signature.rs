// Integration tests for signature generation
mod common;

use common::*;
use imgmatch_rust::imgstructs::SignatureOptions;
use imgmatch_rust::{
    default_gray, is_match, normalized_distance, ImageSignature, Orientation, PixelBuffer, Rgba, SignatureError,
};

#[test]
fn default_signature_has_648_levels() {
    let sig = ImageSignature::default().generate(&default_scene()).unwrap();
    assert_eq!(sig.len(), 9 * 9 * 8);
    assert!(sig.iter().all(|v| (-2..=2).contains(v)));
    assert!(!sig.is_zero());
}

#[test]
fn signature_length_follows_grid_size() {
    for n in [1, 3, 5, 12] {
        let options = SignatureOptions {
            grid_point_num: n,
            ..SignatureOptions::default()
        };
        let sig = ImageSignature::new(options)
            .unwrap()
            .generate(&default_scene())
            .unwrap();
        assert_eq!(sig.len(), n * n * 8, "grid {}", n);
    }
}

#[test]
fn solid_images_have_zero_signatures() {
    let generator = ImageSignature::default();
    for pixel in [[0, 0, 0, 255], [200, 30, 90, 255], [10, 200, 10, 128]] {
        let buffer = PixelBuffer::from_rgba(64, 48, &solid_rgba(64, 48, pixel)).unwrap();
        let sig = generator.generate(&buffer).unwrap();
        assert_eq!(sig.len(), 648);
        assert!(sig.is_zero(), "pixel {:?}", pixel);
    }
}

#[test]
fn tiny_images_still_produce_full_length() {
    let generator = ImageSignature::default();
    let buffer = PixelBuffer::filled(1, 1, Rgba::opaque(255, 0, 0)).unwrap();
    let sig = generator.generate(&buffer).unwrap();
    assert_eq!(sig.len(), 648);
    assert!(sig.is_zero());
}

#[test]
fn signature_is_deterministic() {
    let generator = ImageSignature::default();
    let img = default_scene();
    let a = generator.generate(&img).unwrap();
    let b = generator.generate(&img).unwrap();
    assert_eq!(a, b);
    assert_eq!(normalized_distance(&a, &b), 0.0);
}

#[test]
fn brightness_shift_matches() {
    let generator = ImageSignature::default();
    let img = default_scene();
    let a = generator.generate(&img).unwrap();
    let b = generator.generate(&brighten(&img, 10)).unwrap();
    assert!(is_match(&a, &b), "dist = {}", normalized_distance(&a, &b));
}

#[test]
fn downscaled_copy_matches() {
    let generator = ImageSignature::default();
    let img = default_scene();
    let a = generator.generate(&img).unwrap();
    let b = generator.generate(&downscale_half(&img)).unwrap();
    let dist = normalized_distance(&a, &b);
    assert!(dist < 0.2, "dist = {}", dist);

    let c = generator.generate(&scene(100, 75)).unwrap();
    assert!(is_match(&a, &c));
}

#[test]
fn negative_is_maximally_distant() {
    let generator = ImageSignature::default();
    let img = default_scene();
    let a = generator.generate(&img).unwrap();
    let b = generator.generate(&invert(&img)).unwrap();
    let dist = normalized_distance(&a, &b);
    assert!(dist > 0.9, "dist = {}", dist);
    assert!(!is_match(&a, &b));
}

#[test]
fn unrelated_images_do_not_match() {
    let generator = ImageSignature::default();
    let a = generator.generate(&default_scene()).unwrap();
    let b = generator
        .generate(&rings(SCENE_WIDTH, SCENE_HEIGHT))
        .unwrap();
    let dist = normalized_distance(&a, &b);
    assert!(dist > 0.5, "dist = {}", dist);
    assert!(!is_match(&a, &b));
}

#[test]
fn scene_helpers_keep_their_sizes() {
    let img = scene(40, 30);
    assert_eq!((img.width(), img.height()), (40, 30));
    assert_eq!(downscale_half(&img).width(), 20);
    assert_eq!(solid_rgba(3, 2, [1, 2, 3, 4]).len(), 24);
}

#[test]
fn default_gray_weights_opaque_pixels() {
    assert!((default_gray(255, 255, 255, 255) - 1.0).abs() < 1e-12);
    assert_eq!(default_gray(0, 0, 0, 255), 0.0);
    let green = default_gray(0, 255, 0, 255);
    assert!((green - 0.7154).abs() < 1e-12, "got {}", green);
}

#[test]
fn default_gray_blends_translucent_pixels_against_one() {
    // 1 * (1 - a) + 255 * a per channel, weights sum to 1, no /255
    let white = default_gray(255, 255, 255, 128);
    assert!((white - 128.49803921568628).abs() < 1e-9, "got {}", white);
    // fully transparent pixels are the background itself
    assert!((default_gray(0, 0, 0, 0) - 1.0).abs() < 1e-12);
    assert!((default_gray(200, 10, 90, 0) - 1.0).abs() < 1e-12);
}

#[test]
fn gray_calculator_is_pluggable() {
    let options =
        SignatureOptions::default().with_gray_calculator(|_r: u8, _g: u8, _b: u8, _a: u8| 0.5);
    let sig = ImageSignature::new(options)
        .unwrap()
        .generate(&default_scene())
        .unwrap();
    assert!(sig.is_zero());
}

#[test]
fn averaged_pixels_keep_length_and_self_distance() {
    let options = SignatureOptions {
        use_average_pixel: true,
        ..SignatureOptions::default()
    };
    let generator = ImageSignature::new(options).unwrap();
    let a = generator.generate(&default_scene()).unwrap();
    assert_eq!(a.len(), 648);
    assert!(!a.is_zero());
    assert_eq!(normalized_distance(&a, &a), 0.0);
}

#[test]
fn cropping_signs_the_inner_window() {
    let generator = ImageSignature::new(SignatureOptions::with_crop(5, 95)).unwrap();
    let img = default_scene();
    let cropped = generator.generate(&img).unwrap();
    assert_eq!(cropped.len(), 648);

    let full = ImageSignature::default().generate(&img).unwrap();
    assert_ne!(cropped, full);
}

#[test]
fn invalid_options_are_rejected() {
    let cases = [
        SignatureOptions::with_crop(90, 10),
        SignatureOptions::with_crop(0, 101),
        SignatureOptions {
            grid_point_num: 0,
            ..SignatureOptions::default()
        },
        SignatureOptions {
            level: 0,
            ..SignatureOptions::default()
        },
        SignatureOptions {
            identical_tolerance: f64::NAN,
            ..SignatureOptions::default()
        },
    ];
    for options in cases {
        let err = ImageSignature::new(options).unwrap_err();
        assert!(matches!(err, SignatureError::InvalidParameter { .. }), "{err}");
    }
}

#[test]
fn malformed_buffers_are_rejected() {
    let err = PixelBuffer::from_rgba(4, 4, &[0u8; 63]).unwrap_err();
    assert!(matches!(
        err,
        SignatureError::BufferSizeMismatch {
            expected: 64,
            actual: 63,
            ..
        }
    ));

    let err = PixelBuffer::from_rgba(0, 10, &[]).unwrap_err();
    assert!(matches!(err, SignatureError::EmptyImage { .. }));
}

#[test]
fn orientation_passes_come_in_fixed_order() {
    let generator = ImageSignature::default();
    let img = default_scene();
    let all = generator.generate_all_orientations(&img).unwrap();
    assert_eq!(all.len(), 4);
    assert_eq!(all[0], generator.generate(&img).unwrap());
    assert_eq!(
        all[2],
        generator.generate_oriented(&img, Orientation::Deg180).unwrap()
    );
    assert_ne!(all[0], all[1]);
}
