//! Error types for stackwise

use thiserror::Error;

/// Result type alias for ensemble operations
pub type Result<T> = std::result::Result<T, StackError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum StackError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),
}

impl StackError {
    /// Shape error for a target vector whose length does not match the rows of `x`
    pub(crate) fn target_length(n_rows: usize, y_len: usize) -> Self {
        StackError::ShapeError {
            expected: format!("y length = {}", n_rows),
            actual: format!("y length = {}", y_len),
        }
    }
}

impl From<polars::error::PolarsError> for StackError {
    fn from(err: polars::error::PolarsError) -> Self {
        StackError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for StackError {
    fn from(err: serde_json::Error) -> Self {
        StackError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for StackError {
    fn from(err: ndarray::ShapeError) -> Self {
        StackError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
