pub mod fill;
pub mod grid;
pub mod overlay;

use std::collections::BTreeMap;

use image::RgbaImage;
use tracing::{debug, info};

use crate::models::{question_id, AnswerSet, BubbleMark, ExtractedAnswerSet, LayoutDescriptor, StudentInfo};
use grid::GridGeometry;

/// Result of one extraction run. Regenerated from scratch on every call.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub answers: ExtractedAnswerSet,
    /// One mark per modeled (question, choice), ordered by question then choice.
    pub marks: Vec<BubbleMark>,
    /// Question ids where more than one bubble was filled and the lowest
    /// filled choice was kept.
    pub ambiguous: Vec<String>,
}

/// Template-driven optical mark reader.
#[derive(Debug, Clone, Copy, Default)]
pub struct OmrExtractor {
    pub geometry: GridGeometry,
}

impl OmrExtractor {
    pub fn new(geometry: GridGeometry) -> Self {
        Self { geometry }
    }

    /// Sample every modeled bubble of `layout` on a normalised image.
    pub fn detect_marks(&self, img: &RgbaImage, layout: &LayoutDescriptor) -> Vec<BubbleMark> {
        let (width, height) = img.dimensions();
        self.geometry
            .model_bubbles(width, height, layout)
            .into_iter()
            .map(|slot| {
                let ratio = fill::dark_ratio(img, &slot);
                BubbleMark {
                    question: slot.question,
                    choice: slot.choice,
                    center_x: slot.center_x,
                    center_y: slot.center_y,
                    radius: slot.radius,
                    dark_ratio: ratio,
                    filled: fill::is_filled(ratio),
                }
            })
            .collect()
    }

    pub fn extract(&self, img: &RgbaImage, layout: &LayoutDescriptor) -> Extraction {
        let marks = self.detect_marks(img, layout);
        let (mcq_answers, ambiguous) = decode_marks(&marks);

        info!(
            test_id = %layout.test_id,
            modeled = layout.modeled_questions(),
            answered = mcq_answers.len(),
            ambiguous = ambiguous.len(),
            "extracted answers"
        );

        Extraction {
            answers: AnswerSet {
                mcq_answers,
                short_answers: BTreeMap::new(),
                student_info: StudentInfo::placeholder(),
            },
            marks,
            ambiguous,
        }
    }
}

/// Extract with the default template geometry.
pub fn extract(img: &RgbaImage, layout: &LayoutDescriptor) -> Extraction {
    OmrExtractor::default().extract(img, layout)
}

/// Decode fill verdicts into answers.
///
/// Per question: no filled bubble leaves the question out; otherwise the
/// lowest filled choice index is the answer. Questions with several filled
/// bubbles are also reported in the second return value.
pub fn decode_marks(marks: &[BubbleMark]) -> (BTreeMap<String, u8>, Vec<String>) {
    let mut filled: BTreeMap<u32, Vec<u8>> = BTreeMap::new();
    for mark in marks.iter().filter(|m| m.filled) {
        filled.entry(mark.question).or_default().push(mark.choice);
    }

    let mut answers = BTreeMap::new();
    let mut ambiguous = Vec::new();
    for (question, mut choices) in filled {
        choices.sort_unstable();
        let id = question_id(question);
        if choices.len() > 1 {
            debug!(question = %id, ?choices, "multiple bubbles filled, keeping the first");
            ambiguous.push(id.clone());
        }
        answers.insert(id, choices[0]);
    }
    (answers, ambiguous)
}
