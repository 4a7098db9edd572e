use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Feature column '{0}' not found")]
    MissingFeature(String),

    #[error("Feature frame has no '{0}' column")]
    MissingTarget(String),

    #[error("Column '{column}' has a missing value at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("Feature matrix has {got} {what}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Row {row} is out of range for a feature matrix of {len} rows")]
    RowOutOfRange { row: usize, len: usize },

    #[error("Model returned {got} predictions for {expected} rows")]
    PredictionCountMismatch { expected: usize, got: usize },

    #[error("Lag window must be at least 1, got {0}")]
    InvalidLagWindow(u32),

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("Model '{0}' has not been fitted")]
    NotFitted(String),

    #[error("Model was fitted on columns {expected:?} but got {got:?}")]
    ColumnMismatch {
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("Test size must lie strictly between 0 and 1, got {0}")]
    InvalidTestSize(f64),

    #[error("Need at least 2 rows to split into train and test sets, got {0}")]
    NotEnoughRows(usize),

    #[error("Model '{name}' has no version {version}")]
    VersionNotFound { name: String, version: u32 },

    #[error("Model '{0}' has no registered versions")]
    ModelNotFound(String),

    #[error("Failed to create registry directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to read registry file '{0}'")]
    RegistryRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write registry file '{0}'")]
    RegistryWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode model artifact")]
    ArtifactEncode(#[source] Box<bincode::error::EncodeError>),

    #[error("Failed to decode model artifact '{0}'")]
    ArtifactDecode(PathBuf, #[source] Box<bincode::error::DecodeError>),

    #[error("Failed to (de)serialize model metadata")]
    Metadata(#[from] serde_json::Error),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
