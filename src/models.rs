use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::ReviewError;

/// Number of answer choices modeled per question (letters A-E).
pub const CHOICES_PER_QUESTION: u8 = 5;

/// Questions beyond this index are not modeled on a sheet.
pub const MAX_QUESTIONS: u32 = 20;

/// Test metadata used to build the bubble grid for one extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutDescriptor {
    pub test_id: String,
    pub version_id: String,
    pub layout_seed: i64,
    pub num_questions: u32,
}

impl LayoutDescriptor {
    pub fn new(test_id: impl Into<String>, version_id: impl Into<String>, num_questions: u32) -> Self {
        Self {
            test_id: test_id.into(),
            version_id: version_id.into(),
            layout_seed: 0,
            num_questions,
        }
    }

    pub fn with_seed(mut self, layout_seed: i64) -> Self {
        self.layout_seed = layout_seed;
        self
    }

    /// Read a layout from a JSON file using the camelCase wire names.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read layout {:?}", path.as_ref()))?;
        serde_json::from_str(&raw).with_context(|| format!("Invalid layout {:?}", path.as_ref()))
    }

    /// Number of questions that will actually be modeled.
    pub fn modeled_questions(&self) -> u32 {
        self.num_questions.min(MAX_QUESTIONS)
    }
}

/// A single candidate bubble and its fill verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BubbleMark {
    /// 0-based question index
    pub question: u32,
    /// 0-based choice index
    pub choice: u8,
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    /// Fraction of sampled pixels that were dark.
    pub dark_ratio: f32,
    pub filled: bool,
}

impl BubbleMark {
    pub fn letter(&self) -> char {
        choice_letter(self.choice)
    }

    pub fn question_id(&self) -> String {
        question_id(self.question)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentInfo {
    pub name: String,
    pub student_id: String,
}

impl StudentInfo {
    pub fn new(name: impl Into<String>, student_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            student_id: student_id.into(),
        }
    }

    /// Identity returned by extraction. Sheets carry no machine-readable
    /// identity, so both fields start blank and must be filled by a reviewer.
    pub fn placeholder() -> Self {
        Self::default()
    }
}

/// Answers keyed by question id (`q1`, `q2`, ...).
///
/// A question id is present in `mcq_answers` only when a choice was decided
/// for it; unanswered questions are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSet {
    pub mcq_answers: BTreeMap<String, u8>,
    pub short_answers: BTreeMap<String, String>,
    pub student_info: StudentInfo,
}

/// Output of the OMR stage.
pub type ExtractedAnswerSet = AnswerSet;

/// Reviewer-editable copy that feeds scoring.
pub type ReviewedAnswerSet = AnswerSet;

/// Build the 1-based question id for a 0-based question index.
pub fn question_id(index: u32) -> String {
    format!("q{}", index + 1)
}

/// Parse `q<N>` (N >= 1) back into a 0-based question index.
pub fn parse_question_id(id: &str) -> Result<u32, ReviewError> {
    id.strip_prefix('q')
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|n| *n >= 1)
        .map(|n| n - 1)
        .ok_or_else(|| ReviewError::InvalidQuestionId(id.to_string()))
}

pub fn choice_letter(choice: u8) -> char {
    (b'A' + choice) as char
}

/// Accept either a letter (`A`..`E`, any case) or a 0-based index.
pub fn parse_choice(value: &str) -> Option<u8> {
    let value = value.trim();
    let mut chars = value.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            let idx = c.to_ascii_uppercase() as u8 - b'A';
            return (idx < CHOICES_PER_QUESTION).then_some(idx);
        }
    }
    value.parse::<u8>().ok()
}
