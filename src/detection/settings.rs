use serde::{Deserialize, Serialize};

pub const DEFAULT_BRIGHTNESS: f32 = 100.0;
pub const DEFAULT_CONTRAST: f32 = 100.0;
pub const DEFAULT_THRESHOLD: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Perspective quadrilateral in source-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

impl Quad {
    /// The image's own corners: (0,0) (w,0) (0,h) (w,h).
    pub fn full_frame(width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(w, 0.0),
            bottom_left: Point::new(0.0, h),
            bottom_right: Point::new(w, h),
        }
    }

    /// Corners in clockwise order starting top-left.
    pub fn clockwise(&self) -> [Point; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// True when any three corners are (nearly) collinear, which includes
    /// coincident corners. Such a quad has no projective mapping.
    pub fn is_degenerate(&self) -> bool {
        let corners = self.clockwise();
        (0..4).any(|skip| {
            let [a, b, c]: [Point; 3] = match skip {
                0 => [corners[1], corners[2], corners[3]],
                1 => [corners[0], corners[2], corners[3]],
                2 => [corners[0], corners[1], corners[3]],
                _ => [corners[0], corners[1], corners[2]],
            };
            let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
            cross.abs() < 1e-3
        })
    }
}

/// How the perspective quad is used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerspectiveMode {
    /// Corners are accepted and kept but the image is not warped.
    #[default]
    Passthrough,
    /// Projective warp of the quad onto the full frame.
    Warp,
}

/// User-adjustable preprocessing parameters.
///
/// Settings are never accumulated into an image: every render re-derives its
/// output from the untouched source with the current values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingSettings {
    /// Degrees, always kept in `0..360`.
    rotation: f32,
    /// Percent, nominal 100.
    pub brightness: f32,
    /// Percent, nominal 100.
    pub contrast: f32,
    /// Luma cutoff for binarization.
    pub threshold: u8,
    pub corners: Quad,
    pub perspective_mode: PerspectiveMode,
}

impl PreprocessingSettings {
    /// Defaults for a freshly loaded source of the given size.
    pub fn for_image(width: u32, height: u32) -> Self {
        Self {
            rotation: 0.0,
            brightness: DEFAULT_BRIGHTNESS,
            contrast: DEFAULT_CONTRAST,
            threshold: DEFAULT_THRESHOLD,
            corners: Quad::full_frame(width, height),
            perspective_mode: PerspectiveMode::Passthrough,
        }
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn set_rotation(&mut self, degrees: f32) {
        self.rotation = degrees.rem_euclid(360.0);
    }

    pub fn rotate_clockwise(&mut self) {
        self.set_rotation(self.rotation + 90.0);
    }

    pub fn rotate_counter_clockwise(&mut self) {
        self.set_rotation(self.rotation - 90.0);
    }

    /// Restore every field to its default; corners snap back to the frame.
    pub fn reset(&mut self, width: u32, height: u32) {
        *self = Self::for_image(width, height);
    }
}
