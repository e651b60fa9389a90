use std::str::FromStr;

use time::OffsetDateTime;
use tracing::{debug, info};

use crate::error::ReviewError;
use crate::grading::record::{raw_answers, OfflineProcessing, PersistedAttempt};
use crate::grading::{score, AnswerKey, ScoreSummary};
use crate::models::{
    parse_choice, parse_question_id, ExtractedAnswerSet, LayoutDescriptor, ReviewedAnswerSet,
    StudentInfo, CHOICES_PER_QUESTION,
};

/// Lifecycle of one review session. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewState {
    Extracted,
    UnderReview,
    Submitted,
}

/// A reviewer correction for one multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Override {
    pub question: String,
    pub choice: u8,
}

impl Override {
    pub fn new(question: impl Into<String>, choice: u8) -> Self {
        Self {
            question: question.into(),
            choice,
        }
    }
}

impl FromStr for Override {
    type Err = ReviewError;

    /// `q3=D` or `q3=3`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (question, value) = s
            .split_once('=')
            .ok_or_else(|| ReviewError::InvalidOverride(s.to_string()))?;
        let question = question.trim();
        parse_question_id(question)?;
        let choice = parse_choice(value).ok_or_else(|| ReviewError::InvalidOverride(s.to_string()))?;
        Ok(Self::new(question, choice))
    }
}

/// Human-in-the-loop review of one extracted sheet.
///
/// The extracted answers are kept untouched for audit; all edits go to the
/// reviewed copy, and the score is always recomputed from it.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    layout: LayoutDescriptor,
    key: AnswerKey,
    original_image: Option<String>,
    extracted: ExtractedAnswerSet,
    reviewed: ReviewedAnswerSet,
    state: ReviewState,
}

impl ReviewSession {
    pub fn new(extracted: ExtractedAnswerSet, layout: LayoutDescriptor, key: AnswerKey) -> Self {
        Self {
            layout,
            key,
            original_image: None,
            reviewed: extracted.clone(),
            extracted,
            state: ReviewState::Extracted,
        }
    }

    pub fn with_original_image(mut self, reference: impl Into<String>) -> Self {
        self.original_image = Some(reference.into());
        self
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn extracted(&self) -> &ExtractedAnswerSet {
        &self.extracted
    }

    pub fn reviewed(&self) -> &ReviewedAnswerSet {
        &self.reviewed
    }

    /// Live score of the reviewed answers.
    pub fn score(&self) -> ScoreSummary {
        score(&self.reviewed.mcq_answers, &self.key)
    }

    /// Reassign a question's choice and return the recomputed score.
    pub fn apply_override(&mut self, question: &str, choice: u8) -> Result<ScoreSummary, ReviewError> {
        self.ensure_editable()?;
        parse_question_id(question)?;
        if choice >= CHOICES_PER_QUESTION {
            return Err(ReviewError::InvalidChoice {
                question: question.to_string(),
                choice,
            });
        }
        self.begin_edit()?;

        let previous = self.reviewed.mcq_answers.insert(question.to_string(), choice);
        let summary = self.score();
        debug!(question, ?previous, choice, correct = summary.correct, total = summary.total, "override applied");
        Ok(summary)
    }

    pub fn apply(&mut self, correction: &Override) -> Result<ScoreSummary, ReviewError> {
        self.apply_override(&correction.question, correction.choice)
    }

    /// Mark a question as unanswered; it stops counting toward the total.
    pub fn clear_answer(&mut self, question: &str) -> Result<ScoreSummary, ReviewError> {
        self.ensure_editable()?;
        parse_question_id(question)?;
        self.begin_edit()?;
        self.reviewed.mcq_answers.remove(question);
        Ok(self.score())
    }

    /// Set or replace a free-text answer. Short answers are not auto-scored.
    pub fn set_short_answer(&mut self, question: &str, text: impl Into<String>) -> Result<(), ReviewError> {
        self.ensure_editable()?;
        parse_question_id(question)?;
        self.begin_edit()?;
        self.reviewed.short_answers.insert(question.to_string(), text.into());
        Ok(())
    }

    pub fn set_identity(&mut self, identity: StudentInfo) -> Result<(), ReviewError> {
        self.begin_edit()?;
        self.reviewed.student_info = StudentInfo::new(identity.name.trim(), identity.student_id.trim());
        Ok(())
    }

    /// Freeze the session into a persistable record.
    ///
    /// Fails without changing anything but the state (which moves to
    /// `UnderReview`) when the name or student id is blank.
    pub fn submit(&mut self) -> Result<PersistedAttempt, ReviewError> {
        self.begin_edit()?;
        let identity = &self.reviewed.student_info;
        if identity.name.trim().is_empty() {
            return Err(ReviewError::MissingName);
        }
        if identity.student_id.trim().is_empty() {
            return Err(ReviewError::MissingStudentId);
        }

        let summary = self.score();
        let attempt = PersistedAttempt {
            test_id: self.layout.test_id.clone(),
            version_id: self.layout.version_id.clone(),
            layout_seed: self.layout.layout_seed,
            candidate: identity.clone(),
            answers: raw_answers(&self.reviewed),
            auto_total: summary.correct,
            max_total: summary.total,
            final_total: summary.correct,
            submitted_at: OffsetDateTime::now_utc(),
            offline_processing: OfflineProcessing {
                original_image: self.original_image.clone(),
                extracted_answers: self.extracted.clone(),
                reviewed_answers: self.reviewed.clone(),
            },
        };

        self.state = ReviewState::Submitted;
        info!(
            test_id = %attempt.test_id,
            student_id = %attempt.candidate.student_id,
            correct = summary.correct,
            total = summary.total,
            "attempt submitted"
        );
        Ok(attempt)
    }

    fn ensure_editable(&self) -> Result<(), ReviewError> {
        if self.state == ReviewState::Submitted {
            return Err(ReviewError::AlreadySubmitted);
        }
        Ok(())
    }

    /// Call only after the edit has been validated.
    fn begin_edit(&mut self) -> Result<(), ReviewError> {
        self.ensure_editable()?;
        self.state = ReviewState::UnderReview;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides() {
        assert_eq!("q3=D".parse::<Override>(), Ok(Override::new("q3", 3)));
        assert_eq!("q12 = 0".parse::<Override>(), Ok(Override::new("q12", 0)));
        assert!("q3".parse::<Override>().is_err());
        assert!("x3=A".parse::<Override>().is_err());
        assert!("q3=?".parse::<Override>().is_err());
    }
}
