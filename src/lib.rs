pub mod core;
pub mod detection;
pub mod error;
pub mod grading;
pub mod logger;
pub mod models;
pub mod omr;
pub mod pipeline;

pub use detection::{preprocess, ImagePreprocessor, PreprocessSession};
pub use detection::settings::{PerspectiveMode, Point, PreprocessingSettings, Quad};
pub use error::{ReviewError, ScanError};
pub use grading::{score, AnswerKey, Override, PersistedAttempt, ReviewSession, ReviewState, ScoreSummary};
pub use models::{
    AnswerSet, BubbleMark, ExtractedAnswerSet, LayoutDescriptor, ReviewedAnswerSet, StudentInfo,
};
pub use omr::{extract, Extraction, OmrExtractor};
pub use pipeline::{MetadataValue, Pipeline, PipelineData, PipelineStep};
