//! Error summaries over served predictions that have observed ride counts attached.

use crate::model::metrics::{mean_absolute_error, root_mean_squared_error};
use crate::types::prediction::PredictionRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSummary {
    /// Absolute error of the most recent prediction that has an actual value.
    pub latest_error: f64,
    pub mae: f64,
    pub rmse: f64,
    /// Number of predictions with actuals that went into the summary.
    pub n: usize,
}

/// Summarizes the predictions that have `actual_rides`. Returns `None` when none do.
pub fn summarize(records: &[PredictionRecord]) -> Option<MonitoringSummary> {
    let mut observed: Vec<&PredictionRecord> =
        records.iter().filter(|r| r.actual_rides.is_some()).collect();
    observed.sort_by_key(|r| r.prediction_time);

    let (actual, predicted): (Vec<f64>, Vec<f64>) = observed
        .iter()
        .filter_map(|r| r.actual_rides.map(|a| (a, r.prediction)))
        .unzip();
    Some(MonitoringSummary {
        latest_error: observed.last()?.absolute_error()?,
        mae: mean_absolute_error(&actual, &predicted)?,
        rmse: root_mean_squared_error(&actual, &predicted)?,
        n: observed.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(h: u32, prediction: f64, actual: Option<f64>) -> PredictionRecord {
        PredictionRecord {
            location_id: "HB102".to_string(),
            prediction,
            prediction_time: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap(),
            actual_rides: actual,
        }
    }

    #[test]
    fn test_summary_uses_latest_observed_hour() {
        let records = [
            record(9, 5.0, Some(2.0)),
            record(7, 4.0, Some(4.0)),
            record(10, 8.0, None),
            record(8, 1.0, Some(2.0)),
        ];
        let summary = summarize(&records).unwrap();
        assert_eq!(summary.n, 3);
        assert_eq!(summary.latest_error, 3.0);
        assert!((summary.mae - 4.0 / 3.0).abs() < 1e-12);
        assert!((summary.rmse - (10.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_no_actuals() {
        assert_eq!(summarize(&[record(1, 1.0, None)]), None);
        assert_eq!(summarize(&[]), None);
    }
}
