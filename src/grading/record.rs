use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::models::{ExtractedAnswerSet, ReviewedAnswerSet, StudentInfo};

/// Audit trail of the scan that produced an attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineProcessing {
    /// Reference to the scanned image (a path before saving, the stored file name after).
    pub original_image: Option<String>,
    pub extracted_answers: ExtractedAnswerSet,
    pub reviewed_answers: ReviewedAnswerSet,
}

/// Frozen result of a submitted review session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAttempt {
    pub test_id: String,
    pub version_id: String,
    pub layout_seed: i64,
    pub candidate: StudentInfo,
    /// Every answer as text: MCQ as the stringified choice index, short answers verbatim.
    pub answers: BTreeMap<String, String>,
    pub auto_total: u32,
    pub max_total: u32,
    pub final_total: u32,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub offline_processing: OfflineProcessing,
}

/// Flatten MCQ and short answers into one textual map.
pub fn raw_answers(reviewed: &ReviewedAnswerSet) -> BTreeMap<String, String> {
    let mut answers: BTreeMap<String, String> = reviewed
        .mcq_answers
        .iter()
        .map(|(q, choice)| (q.clone(), choice.to_string()))
        .collect();
    for (q, text) in &reviewed.short_answers {
        answers.insert(q.clone(), text.clone());
    }
    answers
}
