use crate::types::series_layout::SeriesLayout;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Required column '{column}' not found for {layout} series")]
    MissingColumn { column: String, layout: SeriesLayout },

    #[error("Column '{column}' has type {dtype}, which cannot be read as a timestamp")]
    UnsupportedTimestampType { column: String, dtype: String },

    #[error("Could not parse '{value}' in column '{column}' as a timestamp")]
    InvalidTimestamp { column: String, value: String },

    #[error("Station list is empty")]
    NoStations,

    #[error("Lag window must be at least one hour")]
    EmptyLagWindow,

    #[error("Polars operation failed for station {station}: {source}")]
    Polars {
        station: String,
        #[source]
        source: PolarsError,
    },

    #[error("Failed processing DataFrame: {0}")]
    DataFrameProcessing(#[from] PolarsError),
}
