use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing column '{column}' in {file}")]
    MissingColumn { file: String, column: String },

    #[error("Malformed row {row} in {file}: {reason}")]
    MalformedRow {
        file: String,
        row: usize,
        reason: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
