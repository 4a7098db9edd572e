use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to create store directory '{0}'")]
    DirCreation(PathBuf, #[source] std::io::Error),

    #[error("Feature group '{name}' version {version} does not exist")]
    GroupNotFound { name: String, version: u32 },

    #[error("Frame for feature group '{group}' lacks primary key column '{column}'")]
    MissingPrimaryKey { group: String, column: String },

    #[error("Frame for feature group '{group}' does not match the stored schema")]
    SchemaMismatch {
        group: String,
        #[source]
        source: PolarsError,
    },

    #[error("I/O error writing parquet file '{0}'")]
    ParquetWriteIo(PathBuf, #[source] std::io::Error),

    #[error("Encoding error writing parquet file '{0}'")]
    ParquetWritePolars(PathBuf, #[source] PolarsError),

    #[error("Failed to read parquet file '{0}'")]
    ParquetRead(PathBuf, #[source] PolarsError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
