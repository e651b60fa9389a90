use image::RgbaImage;

use crate::detection::preprocessing::luma;
use crate::omr::grid::BubbleSlot;

/// Grayscale value below which a sampled pixel counts as dark. Independent of
/// the binarization threshold.
pub const DARK_PIXEL_THRESHOLD: f32 = 128.0;

/// A bubble is filled when strictly more than this fraction of it is dark.
pub const FILL_RATIO: f32 = 0.5;

/// Fraction of pixels within `slot.radius` of its center that are dark.
/// Pixels outside the image are not sampled; an empty sample yields 0.
pub fn dark_ratio(img: &RgbaImage, slot: &BubbleSlot) -> f32 {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }
    let r = slot.radius.max(0.0);

    let min_x = (slot.center_x - r).floor().max(0.0) as u32;
    let min_y = (slot.center_y - r).floor().max(0.0) as u32;
    let max_x = (slot.center_x + r).ceil().max(0.0) as u32;
    let max_y = (slot.center_y + r).ceil().max(0.0) as u32;

    let mut dark: u64 = 0;
    let mut count: u64 = 0;

    for y in min_y..=max_y.min(height - 1) {
        for x in min_x..=max_x.min(width - 1) {
            let dx = x as f32 - slot.center_x;
            let dy = y as f32 - slot.center_y;
            if dx * dx + dy * dy <= r * r {
                count += 1;
                if luma(img.get_pixel(x, y)) < DARK_PIXEL_THRESHOLD {
                    dark += 1;
                }
            }
        }
    }

    if count > 0 {
        dark as f32 / count as f32
    } else {
        0.0
    }
}

pub fn is_filled(ratio: f32) -> bool {
    ratio > FILL_RATIO
}
