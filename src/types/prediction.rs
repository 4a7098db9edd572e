use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One served prediction: the expected ride count at a station for one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub location_id: String,
    pub prediction: f64,
    /// The hour the prediction is for (UTC-naive).
    pub prediction_time: NaiveDateTime,
    /// Observed rides for that hour, once known.
    pub actual_rides: Option<f64>,
}

impl PredictionRecord {
    pub fn absolute_error(&self) -> Option<f64> {
        self.actual_rides.map(|actual| (actual - self.prediction).abs())
    }
}
