mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from omrgrade for tests
pub use omrgrade::core::db::{AttemptRepository, GradingDb, StoredAttempt};
pub use omrgrade::{
    AnswerKey, BubbleMark, Extraction, LayoutDescriptor, OmrExtractor, PersistedAttempt,
    PreprocessSession, PreprocessingSettings, ReviewError, ReviewSession, ReviewState, StudentInfo,
};
