//! Hourly bike-demand forecasting for Citi Bike stations.
//!
//! The core is [`FeatureBuilder`], which turns an hourly ride-count series into per-station
//! tables of lag and calendar features. Around it sit the steps that feed and consume it:
//! [`TripDownloader`] and [`hourly_rides`] produce the series, a [`FeatureStore`] keeps the
//! features, a [`Regressor`] is trained and versioned in a [`ModelRegistry`], and the
//! serving functions predict the next hour and track the error once actual rides are known.
//! [`Ridecast`] runs all of it against one data directory.

mod error;
mod features;
mod model;
mod monitoring;
mod ridecast;
mod serving;
mod store;
mod trip_data;
mod types;
mod utils;

pub use error::RidecastError;
pub use ridecast::*;
pub use utils::{get_data_dir, DataDirs};

pub use features::builder::*;
pub use features::calendar::CalendarFeatures;
pub use features::error::FeatureError;

pub use trip_data::downloader::*;
pub use trip_data::error::TripDataError;
pub use trip_data::time_series::*;

pub use store::error::StoreError;
pub use store::feature_store::*;

pub use model::error::ModelError;
pub use model::feature_matrix::FeatureMatrix;
pub use model::gradient_boosting::*;
pub use model::metrics::*;
pub use model::registry::*;
pub use model::regressor::*;
pub use model::training::*;

pub use serving::error::ServingError;
pub use serving::prediction_csv::*;
pub use serving::predictor::*;

pub use monitoring::*;

pub use types::config::*;
pub use types::feature_group::*;
pub use types::prediction::PredictionRecord;
pub use types::series_layout::*;
