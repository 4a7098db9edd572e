//! Rolling next-hour predictions from the latest feature row of each station.

use crate::features::builder::{lag_column, DAY_OF_WEEK, HOUR, IS_WEEKEND};
use crate::features::calendar::CalendarFeatures;
use crate::features::error::FeatureError;
use crate::features::timestamps::{column_to_millis, HOUR_MS};
use crate::model::error::ModelError;
use crate::model::feature_matrix::FeatureMatrix;
use crate::model::regressor::Regressor;
use crate::serving::error::ServingError;
use crate::serving::prediction_csv::ACTUAL_RIDES;
use crate::types::feature_group::PREDICTION_TIME;
use crate::types::prediction::PredictionRecord;
use crate::types::series_layout::{SeriesLayout, LOCATION_ID, PICKUP_HOUR, TARGET};
use chrono::DateTime;
use log::{info, warn};
use polars::prelude::*;

pub const PREDICTION: &str = "prediction";

/// Builds, for each station, the feature row of the hour after its latest observed row.
///
/// The latest row's `target` becomes `lag_1`, its `lag_k` becomes `lag_{k+1}` (the oldest
/// lag falls off), and calendar features are derived from `pickup_hour + 1h`. The output
/// has `pickup_hour` (the hour being predicted), `location_id`, the lag columns and the
/// calendar columns, but no `target`. Stations without rows are skipped with a warning.
pub fn next_hour_features<S: AsRef<str>>(
    features: &DataFrame,
    stations: &[S],
) -> Result<DataFrame, ServingError> {
    let max_lag = features
        .get_column_names_str()
        .iter()
        .filter_map(|name| name.strip_prefix("lag_").and_then(|n| n.parse::<u32>().ok()))
        .max()
        .ok_or(ServingError::NoLagColumns)?;
    for required in [PICKUP_HOUR, LOCATION_ID, TARGET] {
        if features.get_column_index(required).is_none() {
            return Err(ServingError::Feature(FeatureError::MissingColumn {
                column: required.to_string(),
                layout: SeriesLayout::long(),
            }));
        }
    }

    let mut locations = Vec::new();
    let mut hours = Vec::new();
    let mut lags: Vec<Vec<f64>> = vec![Vec::new(); max_lag as usize];
    let mut hour_of_day = Vec::new();
    let mut day_of_week = Vec::new();
    let mut is_weekend = Vec::new();

    for station in stations.iter().map(AsRef::as_ref) {
        let latest = features
            .clone()
            .lazy()
            .filter(col(LOCATION_ID).eq(lit(station)))
            .sort([PICKUP_HOUR], SortMultipleOptions::default())
            .tail(1)
            .collect()?;
        if latest.height() == 0 {
            warn!("No feature rows for station {}, skipping", station);
            continue;
        }

        let Some(last_hour) = column_to_millis(latest.column(PICKUP_HOUR)?)?
            .first()
            .copied()
            .flatten()
        else {
            warn!("Latest feature row for station {} has no timestamp, skipping", station);
            continue;
        };
        let next_hour = last_hour + HOUR_MS;
        let Some(calendar) = CalendarFeatures::from_millis(next_hour) else {
            continue;
        };

        // lag_1 of the next hour is this hour's target, lag_k is this hour's lag_{k-1}.
        let mut shifted = Vec::with_capacity(max_lag as usize);
        shifted.push(value_at(&latest, TARGET)?);
        for lag in 1..max_lag {
            shifted.push(value_at(&latest, &lag_column(lag))?);
        }
        let Some(shifted) = shifted.into_iter().collect::<Option<Vec<f64>>>() else {
            warn!("Latest feature row for station {} has gaps, skipping", station);
            continue;
        };

        locations.push(station.to_string());
        hours.push(next_hour);
        for (column, value) in lags.iter_mut().zip(shifted) {
            column.push(value);
        }
        hour_of_day.push(calendar.hour);
        day_of_week.push(calendar.day_of_week);
        is_weekend.push(calendar.is_weekend);
    }

    let mut columns: Vec<Column> = Vec::with_capacity(max_lag as usize + 5);
    columns.push(
        Series::new(PICKUP_HOUR.into(), hours)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
            .into(),
    );
    columns.push(Column::new(LOCATION_ID.into(), locations));
    for (lag, values) in (1..=max_lag).zip(lags) {
        columns.push(Column::new(lag_column(lag).into(), values));
    }
    columns.push(Column::new(HOUR.into(), hour_of_day));
    columns.push(Column::new(DAY_OF_WEEK.into(), day_of_week));
    columns.push(Column::new(IS_WEEKEND.into(), is_weekend));
    Ok(DataFrame::new(columns)?)
}

fn value_at(frame: &DataFrame, column: &str) -> Result<Option<f64>, ServingError> {
    let values = frame.column(column)?.cast(&DataType::Float64)?;
    Ok(values.f64()?.get(0))
}

/// Predicts the next hour for each station with `model`.
///
/// Returns a frame with `location_id`, `prediction` and `prediction_time`, where
/// `prediction_time` is the hour being predicted.
pub fn predict_next_hour<M: Regressor, S: AsRef<str>>(
    model: &M,
    features: &DataFrame,
    stations: &[S],
) -> Result<DataFrame, ServingError> {
    let next = next_hour_features(features, stations)?;
    let matrix = FeatureMatrix::from_frame(&next)?;
    let predictions = if matrix.is_empty() {
        Vec::new()
    } else {
        model.predict(&matrix)?
    };
    if predictions.len() != matrix.len() {
        return Err(ModelError::PredictionCountMismatch {
            expected: matrix.len(),
            got: predictions.len(),
        }
        .into());
    }
    info!(
        "Predicted next hour for {} of {} stations with {}",
        predictions.len(),
        stations.len(),
        model.name()
    );

    let prediction_time = next
        .column(PICKUP_HOUR)?
        .as_materialized_series()
        .clone()
        .with_name(PREDICTION_TIME.into());
    Ok(DataFrame::new(vec![
        next.column(LOCATION_ID)?.clone(),
        Column::new(PREDICTION.into(), predictions),
        prediction_time.into(),
    ])?)
}

/// Converts a prediction frame (`location_id`, `prediction`, `prediction_time`, optional
/// `actual_rides`) into records.
pub fn records_from_frame(predictions: &DataFrame) -> Result<Vec<PredictionRecord>, ServingError> {
    let locations = predictions.column(LOCATION_ID)?.cast(&DataType::String)?;
    let values = predictions.column(PREDICTION)?.cast(&DataType::Float64)?;
    let times = column_to_millis(predictions.column(PREDICTION_TIME)?)?;
    let actuals = match predictions.column(ACTUAL_RIDES) {
        Ok(column) => Some(column.cast(&DataType::Float64)?),
        Err(_) => None,
    };
    let actual_values: Vec<Option<f64>> = match &actuals {
        Some(column) => column.f64()?.into_iter().collect(),
        None => vec![None; predictions.height()],
    };

    let mut records = Vec::with_capacity(predictions.height());
    for (((location, prediction), time), actual) in locations
        .str()?
        .into_iter()
        .zip(values.f64()?.into_iter())
        .zip(times)
        .zip(actual_values)
    {
        let (Some(location), Some(prediction), Some(time)) = (location, prediction, time) else {
            continue;
        };
        let Some(prediction_time) = DateTime::from_timestamp_millis(time) else {
            continue;
        };
        records.push(PredictionRecord {
            location_id: location.to_string(),
            prediction,
            prediction_time: prediction_time.naive_utc(),
            actual_rides: actual,
        });
    }
    Ok(records)
}
