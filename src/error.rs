//! Crate-wide error type.
//!
//! Every variant maps to a process exit code so the `lbi` binary can report
//! failures the same way regardless of which stage produced them:
//!
//! - `2`: usage, configuration, or schema problems
//! - `3`: no usable data (sources unreachable, too little history)
//! - `4`: computation or I/O failures

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Neither the primary nor the fallback source produced a dataset.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// Required columns are absent or unrecognized.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A forecast was requested on a series that is too short.
    #[error("Insufficient history: need at least {needed} monthly points, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    /// The primary forecasting model failed to fit or predict.
    ///
    /// Only raised inside the forecast module; `forecast` recovers from it.
    #[error("Model fit failed: {0}")]
    ModelFit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Config(_) | AppError::SchemaMismatch(_) => 2,
            AppError::DataUnavailable(_) | AppError::InsufficientHistory { .. } => 3,
            AppError::ModelFit(_)
            | AppError::Io(_)
            | AppError::Csv(_)
            | AppError::Database(_)
            | AppError::Json(_) => 4,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_taxonomy() {
        assert_eq!(AppError::SchemaMismatch("x".into()).exit_code(), 2);
        assert_eq!(AppError::DataUnavailable("x".into()).exit_code(), 3);
        assert_eq!(AppError::InsufficientHistory { needed: 12, got: 3 }.exit_code(), 3);
        assert_eq!(AppError::ModelFit("x".into()).exit_code(), 4);
    }
}
