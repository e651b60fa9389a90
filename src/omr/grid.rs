use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{LayoutDescriptor, CHOICES_PER_QUESTION, MAX_QUESTIONS};

/// Template geometry, as fractions of the image size.
///
/// `start_x`, `circle_spacing` and `circle_radius` scale with width;
/// `start_y` and `row_height` scale with height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub start_x: f32,
    pub start_y: f32,
    pub row_height: f32,
    pub circle_spacing: f32,
    pub circle_radius: f32,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self {
            start_x: 0.2,
            start_y: 0.25,
            row_height: 0.035,
            circle_spacing: 0.08,
            circle_radius: 0.015,
        }
    }
}

/// Expected position of one bubble on the sheet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleSlot {
    pub question: u32,
    pub choice: u8,
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
}

impl GridGeometry {
    pub fn slot(&self, width: u32, height: u32, question: u32, choice: u8) -> BubbleSlot {
        let (w, h) = (width as f32, height as f32);
        BubbleSlot {
            question,
            choice,
            center_x: self.start_x * w + choice as f32 * self.circle_spacing * w,
            center_y: self.start_y * h + question as f32 * self.row_height * h,
            radius: self.circle_radius * w,
        }
    }

    /// All slots for `layout`, ordered by question then choice.
    ///
    /// Only the first [`MAX_QUESTIONS`] questions are modeled; anything past
    /// the cap never shows up in the grid.
    pub fn model_bubbles(&self, width: u32, height: u32, layout: &LayoutDescriptor) -> Vec<BubbleSlot> {
        if layout.num_questions > MAX_QUESTIONS {
            warn!(
                test_id = %layout.test_id,
                requested = layout.num_questions,
                cap = MAX_QUESTIONS,
                "layout exceeds the per-sheet question cap; extra questions are not modeled"
            );
        }

        let questions = layout.modeled_questions();
        let mut slots = Vec::with_capacity(questions as usize * CHOICES_PER_QUESTION as usize);
        for question in 0..questions {
            for choice in 0..CHOICES_PER_QUESTION {
                slots.push(self.slot(width, height, question, choice));
            }
        }
        slots
    }
}
