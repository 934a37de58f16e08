use thiserror::Error;

#[derive(Error, Debug)]
pub enum SlicerError {
    #[error("Failed to read audio: {0}")]
    InputRead(String),

    #[error("Slicing failed: {0}")]
    Algorithm(String),

    #[error("Failed to write output: {0}")]
    OutputWrite(String),

    #[error("Failed to write report: {0}")]
    ReportWrite(String),

    #[error("A batch is already being processed, wait for it to complete")]
    BatchInProgress,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Background worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SlicerError>;
