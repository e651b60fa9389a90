use thiserror::Error;

/// Failures while turning an input file or buffer into a scan raster.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Invalid image dimensions: width={width}, height={height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reviewer actions rejected by a review session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("Student name is required before submission")]
    MissingName,

    #[error("Student id is required before submission")]
    MissingStudentId,

    #[error("Attempt has already been submitted")]
    AlreadySubmitted,

    #[error("Choice {choice} is out of range for question {question}")]
    InvalidChoice { question: String, choice: u8 },

    #[error("Invalid question id: {0:?}")]
    InvalidQuestionId(String),

    #[error("Invalid override: {0:?}")]
    InvalidOverride(String),
}
