use crate::features::error::FeatureError;
use crate::model::error::ModelError;
use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServingError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Station id '{0}' cannot be used in a file name")]
    InvalidStationId(String),

    #[error("Feature frame has no lag columns")]
    NoLagColumns,

    #[error("Failed to read prediction file '{path}'")]
    CsvRead {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("Failed to write prediction file '{0}'")]
    CsvWrite(PathBuf, #[source] PolarsError),

    #[error("I/O error on prediction file '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Prediction file '{path}' is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Prediction file '{path}' has invalid {column} value '{value}'")]
    InvalidValue {
        path: PathBuf,
        column: String,
        value: String,
    },

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
