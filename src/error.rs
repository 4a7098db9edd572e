use crate::features::error::FeatureError;
use crate::model::error::ModelError;
use crate::serving::error::ServingError;
use crate::store::error::StoreError;
use crate::trip_data::error::TripDataError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RidecastError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    TripData(#[from] TripDataError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Serving(#[from] ServingError),

    #[error("Failed to create data directory '{0}'")]
    DataDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Failed to determine data directory")]
    DataDirResolution,

    #[error("No raw trip files found in '{0}'")]
    NoRawFiles(PathBuf),

    #[error("I/O error reading '{0}'")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
