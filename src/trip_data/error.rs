use polars::error::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TripDataError {
    #[error("Failed to create raw data directory '{0}'")]
    RawDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Raw data path exists but is not a directory: '{0}'")]
    RawDirNotADirectory(PathBuf),

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Archive download failed")]
    DownloadIo(#[from] std::io::Error),

    #[error("Failed to read zip archive for {month}")]
    ZipArchive {
        month: String,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to write extracted file '{0}'")]
    ExtractWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to read trip CSV '{path}'")]
    CsvRead {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("Trip file '{path}' is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("No trip files given")]
    NoTripFiles,

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
