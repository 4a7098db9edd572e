//! Settings shared by every step of the pipeline.

use crate::features::builder::DEFAULT_MAX_LAG;
use crate::model::training::TrainingConfig;
use crate::trip_data::downloader::DEFAULT_TRIP_DATA_URL;
use crate::types::feature_group::FeatureGroup;
use bon::Builder;
use std::path::PathBuf;

pub const DEFAULT_MODEL_NAME: &str = "citi_bike_best_model";
pub const DEFAULT_STATIONS: [&str; 3] = ["HB102", "HB105", "JC115"];

/// Pipeline configuration. Every field has a default, so `PipelineConfig::default()` runs
/// the standard Citi Bike setup against the platform data directory.
///
/// # Examples
///
/// ```
/// use ridecast::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .data_dir("/tmp/ridecast")
///     .stations(vec!["HB102".to_string()])
///     .max_lag(24)
///     .build();
/// assert_eq!(config.model_name, "citi_bike_best_model");
/// assert_eq!(config.feature_group.version, 2);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct PipelineConfig {
    /// Root of the local data tree. When unset, `<platform data dir>/ridecast` is used.
    #[builder(into)]
    pub data_dir: Option<PathBuf>,
    #[builder(into, default = DEFAULT_TRIP_DATA_URL.to_string())]
    pub trip_data_url: String,
    #[builder(default = FeatureGroup::features())]
    pub feature_group: FeatureGroup,
    #[builder(default = FeatureGroup::predictions())]
    pub prediction_group: FeatureGroup,
    #[builder(into, default = DEFAULT_MODEL_NAME.to_string())]
    pub model_name: String,
    #[builder(default = DEFAULT_STATIONS.iter().map(|s| s.to_string()).collect())]
    pub stations: Vec<String>,
    #[builder(default)]
    pub training: TrainingConfig,
    /// Lag window of the feature builder.
    #[builder(default = DEFAULT_MAX_LAG)]
    pub max_lag: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.data_dir, None);
        assert_eq!(config.trip_data_url, "https://s3.amazonaws.com/tripdata/");
        assert_eq!(config.stations, ["HB102", "HB105", "JC115"]);
        assert_eq!(config.max_lag, 48);
        assert_eq!(config.training.test_size, 0.2);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.prediction_group.event_time.as_deref(), Some("prediction_time"));
    }
}
