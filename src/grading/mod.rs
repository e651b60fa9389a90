pub mod record;
pub mod session;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

pub use record::{OfflineProcessing, PersistedAttempt};
pub use session::{Override, ReviewSession, ReviewState};

/// Authoritative answers: question id -> 0-based choice index.
pub type AnswerKey = BTreeMap<String, u8>;

/// Read an answer key from a JSON object such as `{"q1": 0, "q2": 3}`.
pub fn load_answer_key<P: AsRef<Path>>(path: P) -> anyhow::Result<AnswerKey> {
    let raw = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read answer key {:?}", path.as_ref()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid answer key {:?}", path.as_ref()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub correct: u32,
    pub total: u32,
}

/// Score multiple-choice answers against `key`.
///
/// Only questions present in both `answers` and `key` are graded: a question
/// the key does not cover is left out of both counts instead of being marked
/// wrong, and questions absent from `answers` are never counted.
pub fn score(answers: &BTreeMap<String, u8>, key: &AnswerKey) -> ScoreSummary {
    let mut summary = ScoreSummary::default();
    for (question, choice) in answers {
        if let Some(expected) = key.get(question) {
            summary.total += 1;
            if choice == expected {
                summary.correct += 1;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, u8)]) -> BTreeMap<String, u8> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn unkeyed_questions_are_not_graded() {
        let answers = map(&[("q1", 0), ("q2", 1), ("q9", 4)]);
        let key = map(&[("q1", 0), ("q2", 2), ("q3", 1)]);
        assert_eq!(score(&answers, &key), ScoreSummary { correct: 1, total: 2 });
    }

    #[test]
    fn empty_answers_score_zero_of_zero() {
        let key = map(&[("q1", 0)]);
        assert_eq!(score(&BTreeMap::new(), &key), ScoreSummary::default());
    }
}
