//! Aggregates raw trip records into an hourly ride-count series per station.

use crate::features::timestamps::{floor_to_hour, parse_millis, HOUR_MS};
use crate::trip_data::error::TripDataError;
use crate::types::series_layout::{LOCATION_ID, PICKUP_HOUR, TARGET};
use bon::builder;
use log::{debug, info, warn};
use polars::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

pub const STARTED_AT: &str = "started_at";
pub const START_STATION_ID: &str = "start_station_id";

/// Reads raw trip CSV files and counts rides per `(location_id, pickup_hour)`.
///
/// Each trip is attributed to the hour its `started_at` falls in and to its
/// `start_station_id`. All CSV columns are read as strings so station ids like `5329.03`
/// keep their exact spelling. Trips with no station id or an unreadable start time are
/// dropped and counted in a log message.
///
/// The result is a long-form frame (`pickup_hour`, `location_id`, `target`) sorted by
/// station and hour, ready for [`crate::FeatureBuilder`] with [`crate::SeriesLayout::long`].
///
/// # Arguments
///
/// * `.files(&[PathBuf])`: **Required.** Raw trip CSV files, e.g. from [`crate::TripDownloader`].
/// * `.stations(&[String])`: Optional. Keep only these station ids.
/// * `.fill_missing_hours(bool)`: Optional, default `true`. Emit zero-ride rows for hours
///   without trips between a station's first and last observed hour.
///
/// # Examples
///
/// ```no_run
/// use ridecast::hourly_rides;
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), ridecast::TripDataError> {
/// let files = vec![PathBuf::from("data/raw/JC-202401-citibike-tripdata.csv")];
/// let series = hourly_rides().files(&files).call()?;
/// println!("{}", series.head(Some(5)));
/// # Ok(())
/// # }
/// ```
#[builder]
pub fn hourly_rides(
    files: &[PathBuf],
    stations: Option<&[String]>,
    fill_missing_hours: Option<bool>,
) -> Result<DataFrame, TripDataError> {
    if files.is_empty() {
        return Err(TripDataError::NoTripFiles);
    }
    let fill_missing_hours = fill_missing_hours.unwrap_or(true);
    let wanted: Option<HashSet<&str>> = stations.map(|s| s.iter().map(String::as_str).collect());

    let mut counts: BTreeMap<(String, i64), u32> = BTreeMap::new();
    let mut dropped = 0usize;
    for path in files {
        let trips = read_trips(path)?;
        let started = trips.column(STARTED_AT)?.str()?;
        let station_ids = trips.column(START_STATION_ID)?.str()?;
        for (started_at, station) in started.into_iter().zip(station_ids.into_iter()) {
            let (Some(started_at), Some(station)) = (started_at, station) else {
                dropped += 1;
                continue;
            };
            let station = station.trim();
            if station.is_empty() {
                dropped += 1;
                continue;
            }
            if wanted.as_ref().is_some_and(|w| !w.contains(station)) {
                continue;
            }
            match parse_millis(STARTED_AT, started_at) {
                Ok(millis) => {
                    *counts
                        .entry((station.to_string(), floor_to_hour(millis)))
                        .or_default() += 1;
                }
                Err(_) => dropped += 1,
            }
        }
        debug!("Read {} trips from {}", trips.height(), path.display());
    }
    if dropped > 0 {
        warn!("Dropped {} trips without station id or start time", dropped);
    }

    let (locations, hours, rides) = if fill_missing_hours {
        fill_hours(&counts)
    } else {
        let mut locations = Vec::with_capacity(counts.len());
        let mut hours = Vec::with_capacity(counts.len());
        let mut rides = Vec::with_capacity(counts.len());
        for ((location, hour), count) in &counts {
            locations.push(location.as_str());
            hours.push(*hour);
            rides.push(*count as f64);
        }
        (locations, hours, rides)
    };
    info!(
        "Built hourly series with {} rows for {} stations",
        hours.len(),
        counts.keys().map(|(l, _)| l).collect::<HashSet<_>>().len()
    );

    let pickup_hour = Series::new(PICKUP_HOUR.into(), hours)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    Ok(DataFrame::new(vec![
        pickup_hour.into(),
        Column::new(LOCATION_ID.into(), locations),
        Column::new(TARGET.into(), rides),
    ])?)
}

fn fill_hours(counts: &BTreeMap<(String, i64), u32>) -> (Vec<&str>, Vec<i64>, Vec<f64>) {
    let mut per_station: BTreeMap<&str, BTreeMap<i64, u32>> = BTreeMap::new();
    for ((location, hour), count) in counts {
        per_station
            .entry(location.as_str())
            .or_default()
            .insert(*hour, *count);
    }

    let mut locations = Vec::new();
    let mut hours = Vec::new();
    let mut rides = Vec::new();
    for (location, observed) in per_station {
        let (Some(&first), Some(&last)) = (observed.keys().next(), observed.keys().next_back())
        else {
            continue;
        };
        let mut hour = first;
        while hour <= last {
            locations.push(location);
            hours.push(hour);
            rides.push(observed.get(&hour).copied().unwrap_or(0) as f64);
            hour += HOUR_MS;
        }
    }
    (locations, hours, rides)
}

fn read_trips(path: &Path) -> Result<DataFrame, TripDataError> {
    let trips = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish())
        .map_err(|source| TripDataError::CsvRead {
            path: path.to_path_buf(),
            source,
        })?;
    for column in [STARTED_AT, START_STATION_ID] {
        if trips.get_column_index(column).is_none() {
            return Err(TripDataError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            });
        }
    }
    Ok(trips)
}
