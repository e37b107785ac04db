//! Error types for cvboost

use thiserror::Error;

/// Result type alias for cvboost operations
pub type Result<T> = std::result::Result<T, CvBoostError>;

/// Main error type for dataset preparation and training
#[derive(Error, Debug)]
pub enum CvBoostError {
    /// A referenced column is absent or has an unusable type
    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Invalid split fraction: {0} (must lie strictly between 0 and 1)")]
    InvalidFractionError(f64),

    #[error("Invalid hyperparameter: {name} = {value}, {reason}")]
    InvalidHyperparameterError {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Insufficient data: {0}")]
    InsufficientDataError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Numerical failure during boosting, e.g. a non-finite loss
    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),
}

impl CvBoostError {
    pub(crate) fn hyperparameter(
        name: &str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        CvBoostError::InvalidHyperparameterError {
            name: name.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for CvBoostError {
    fn from(err: polars::error::PolarsError) -> Self {
        CvBoostError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for CvBoostError {
    fn from(err: serde_json::Error) -> Self {
        CvBoostError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for CvBoostError {
    fn from(err: bincode::Error) -> Self {
        CvBoostError::SerializationError(err.to_string())
    }
}
