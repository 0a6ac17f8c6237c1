//! Error types for MailMask.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Recognizer error: {0}")]
    Recognizer(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Overlapping spans: {first:?} ({first_label}) and {second:?} ({second_label})")]
    OverlappingSpans {
        first: (usize, usize),
        first_label: String,
        second: (usize, usize),
        second_label: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
