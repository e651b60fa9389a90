use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, warp, Interpolation, Projection};

use crate::detection::settings::Quad;

/// Pixels uncovered by a rotation or warp are left transparent black.
const UNDRAWN: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Unweighted channel average `(R+G+B)/3`.
pub fn luma(pixel: &Rgba<u8>) -> f32 {
    (pixel[0] as f32 + pixel[1] as f32 + pixel[2] as f32) / 3.0
}

/// Convert to grayscale using the unweighted channel average
pub fn to_grayscale(img: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([luma(img.get_pixel(x, y)).round() as u8])
    })
}

/// Rotate clockwise about the image center without resizing the canvas.
pub fn rotate(img: &RgbaImage, radians: f32) -> RgbaImage {
    if radians == 0.0 {
        return img.clone();
    }
    rotate_about_center(img, radians, Interpolation::Bilinear, UNDRAWN)
}

/// `out = (in - 128) * contrast/100 + 128 + (brightness - 100)` per RGB channel,
/// clipped to `[0, 255]`. Alpha is untouched.
pub fn adjust_brightness_contrast(img: &RgbaImage, brightness: f32, contrast: f32) -> RgbaImage {
    let gain = contrast.max(0.0) / 100.0;
    let offset = brightness - 100.0;

    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            let value = (*channel as f32 - 128.0) * gain + 128.0 + offset;
            *channel = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Map the quad onto the full frame. Returns `None` for degenerate quads.
pub fn warp_perspective(img: &RgbaImage, quad: &Quad) -> Option<RgbaImage> {
    if quad.is_degenerate() {
        return None;
    }
    let frame = Quad::full_frame(img.width(), img.height());
    let from = quad.clockwise().map(|p| (p.x, p.y));
    let to = frame.clockwise().map(|p| (p.x, p.y));
    let projection = Projection::from_control_points(from, to)?;
    Some(warp(img, &projection, Interpolation::Bilinear, UNDRAWN))
}

/// Threshold each pixel to pure black or white; alpha is preserved.
pub fn binarize(img: &RgbaImage, threshold: u8) -> RgbaImage {
    let cutoff = threshold as f32;
    let mut out = img.clone();
    for pixel in out.pixels_mut() {
        let value = if luma(pixel) > cutoff { 255 } else { 0 };
        pixel.0[0] = value;
        pixel.0[1] = value;
        pixel.0[2] = value;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grayscale_is_unweighted_channel_mean() {
        let img = RgbaImage::from_fn(3, 1, |x, _| match x {
            0 => Rgba([10, 20, 31, 255]),
            1 => Rgba([255, 0, 0, 0]),
            _ => Rgba([200, 201, 202, 17]),
        });
        let gray = to_grayscale(&img);
        assert_eq!(gray.dimensions(), (3, 1));
        assert_eq!(gray.get_pixel(0, 0), &Luma([20]));
        assert_eq!(gray.get_pixel(1, 0), &Luma([85]));
        assert_eq!(gray.get_pixel(2, 0), &Luma([201]));
    }

    #[test]
    fn nominal_brightness_contrast_is_identity() {
        let img = RgbaImage::from_fn(4, 4, |x, y| Rgba([(x * 60) as u8, (y * 60) as u8, 7, 200]));
        assert_eq!(adjust_brightness_contrast(&img, 100.0, 100.0), img);
    }

    #[test]
    fn brightness_contrast_clips() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 128, 9]));
        let out = adjust_brightness_contrast(&img, 150.0, 200.0);
        // (200-128)*2+128+50 = 322 -> 255 ; (100-128)*2+178 = 122 ; 128 -> 178
        assert_eq!(out.get_pixel(0, 0), &Rgba([255, 122, 178, 9]));
    }

    #[test]
    fn binarize_uses_strict_greater_than() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 { Rgba([128, 128, 128, 255]) } else { Rgba([129, 129, 129, 40]) }
        });
        let out = binarize(&img, 128);
        assert_eq!(out.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(out.get_pixel(1, 0), &Rgba([255, 255, 255, 40]));
    }
}
