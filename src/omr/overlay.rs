use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_circle_mut;

use crate::models::BubbleMark;

const FILLED: Rgba<u8> = Rgba([0, 200, 0, 255]);
const EMPTY: Rgba<u8> = Rgba([220, 0, 0, 255]);

/// Draw every modeled bubble on a copy of `img`: green when filled, red otherwise.
pub fn draw_marks(img: &RgbaImage, marks: &[BubbleMark]) -> RgbaImage {
    let mut canvas = img.clone();
    for mark in marks {
        let center = (mark.center_x.round() as i32, mark.center_y.round() as i32);
        let radius = mark.radius.round().max(1.0) as i32;
        let color = if mark.filled { FILLED } else { EMPTY };
        draw_hollow_circle_mut(&mut canvas, center, radius, color);
        // two-pixel outline
        draw_hollow_circle_mut(&mut canvas, center, radius + 1, color);
    }
    canvas
}
