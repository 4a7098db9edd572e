//! Per-station prediction history files.
//!
//! Each station gets `location_<id>.csv` with one row per predicted hour. Appending merges
//! with what is already on disk: a new prediction for an hour replaces the stored one, and
//! rows stay sorted by `prediction_time`.

use crate::features::timestamps::{column_to_millis, parse_millis};
use crate::serving::error::ServingError;
use crate::serving::predictor::PREDICTION;
use crate::types::feature_group::PREDICTION_TIME;
use crate::types::prediction::PredictionRecord;
use crate::types::series_layout::{LOCATION_ID, PICKUP_HOUR, TARGET};
use chrono::{DateTime, NaiveDateTime};
use log::{debug, info};
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const ACTUAL_RIDES: &str = "actual_rides";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Path of the history file of `location_id` under `dir`.
///
/// Station ids become part of a file name, so only ASCII letters, digits, `-`, `_` and
/// non-leading `.` are accepted.
pub fn prediction_file(dir: &Path, location_id: &str) -> Result<PathBuf, ServingError> {
    let valid = !location_id.is_empty()
        && !location_id.starts_with('.')
        && location_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(ServingError::InvalidStationId(location_id.to_string()));
    }
    Ok(dir.join(format!("location_{location_id}.csv")))
}

/// Merges `records` into the per-station files under `dir` and returns the files written.
pub fn append_predictions(
    dir: &Path,
    records: &[PredictionRecord],
) -> Result<Vec<PathBuf>, ServingError> {
    fs::create_dir_all(dir).map_err(|e| ServingError::Io(dir.to_path_buf(), e))?;

    let mut by_station: BTreeMap<&str, Vec<&PredictionRecord>> = BTreeMap::new();
    for record in records {
        by_station
            .entry(record.location_id.as_str())
            .or_default()
            .push(record);
    }

    let mut written = Vec::with_capacity(by_station.len());
    for (station, new_records) in by_station {
        let mut merged: BTreeMap<NaiveDateTime, PredictionRecord> = load_predictions(dir, station)?
            .into_iter()
            .map(|r| (r.prediction_time, r))
            .collect();
        let before = merged.len();
        for record in new_records {
            merged.insert(record.prediction_time, record.clone());
        }
        debug!(
            "Station {}: {} stored predictions, {} after merge",
            station,
            before,
            merged.len()
        );

        let path = prediction_file(dir, station)?;
        let rows: Vec<PredictionRecord> = merged.into_values().collect();
        write_records(dir, &path, &rows)?;
        written.push(path);
    }
    info!("Wrote predictions for {} stations to {}", written.len(), dir.display());
    Ok(written)
}

/// Builds a frame with `location_id`, `prediction`, `prediction_time` and `actual_rides`.
pub fn records_to_frame(records: &[PredictionRecord]) -> Result<DataFrame, ServingError> {
    let locations: Vec<&str> = records.iter().map(|r| r.location_id.as_str()).collect();
    let predictions: Vec<f64> = records.iter().map(|r| r.prediction).collect();
    let times: Vec<NaiveDateTime> = records.iter().map(|r| r.prediction_time).collect();
    let actuals: Vec<Option<f64>> = records.iter().map(|r| r.actual_rides).collect();
    Ok(DataFrame::new(vec![
        Column::new(LOCATION_ID.into(), locations),
        Column::new(PREDICTION.into(), predictions),
        Column::new(PREDICTION_TIME.into(), times),
        Column::new(ACTUAL_RIDES.into(), actuals),
    ])?)
}

fn write_records(dir: &Path, path: &Path, records: &[PredictionRecord]) -> Result<(), ServingError> {
    let mut frame = records_to_frame(records)?;
    let formatted: Vec<String> = records
        .iter()
        .map(|r| r.prediction_time.format(TIME_FORMAT).to_string())
        .collect();
    frame.with_column(Column::new(PREDICTION_TIME.into(), formatted))?;

    let mut file = NamedTempFile::new_in(dir).map_err(|e| ServingError::Io(dir.to_path_buf(), e))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut frame)
        .map_err(|e| ServingError::CsvWrite(path.to_path_buf(), e))?;
    file.persist(path)
        .map_err(|e| ServingError::Io(path.to_path_buf(), e.error))?;
    Ok(())
}

/// Reads the stored predictions of one station, oldest first. A missing file reads as empty.
///
/// Files without a `location_id` column take the station id from the file name.
pub fn load_predictions(dir: &Path, location_id: &str) -> Result<Vec<PredictionRecord>, ServingError> {
    let path = prediction_file(dir, location_id)?;
    if !path.exists() {
        return Ok(Vec::new());
    }
    let frame = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.clone()))
        .and_then(|reader| reader.finish())
        .map_err(|source| ServingError::CsvRead {
            path: path.clone(),
            source,
        })?;

    let text = |name: &str| -> Result<Option<Vec<Option<String>>>, ServingError> {
        match frame.column(name) {
            Ok(column) => Ok(Some(
                column
                    .cast(&DataType::String)?
                    .str()?
                    .into_iter()
                    .map(|v| v.map(str::to_string).filter(|s| !s.trim().is_empty()))
                    .collect(),
            )),
            Err(_) => Ok(None),
        }
    };
    let required = |name: &str| -> Result<Vec<Option<String>>, ServingError> {
        text(name)?.ok_or_else(|| ServingError::MissingColumn {
            path: path.clone(),
            column: name.to_string(),
        })
    };
    let invalid = |column: &str, value: &str| ServingError::InvalidValue {
        path: path.clone(),
        column: column.to_string(),
        value: value.to_string(),
    };

    let predictions = required(PREDICTION)?;
    let times = required(PREDICTION_TIME)?;
    let locations = text(LOCATION_ID)?;
    let actuals = text(ACTUAL_RIDES)?;

    let mut records = Vec::with_capacity(frame.height());
    for row in 0..frame.height() {
        let (Some(prediction), Some(time)) = (&predictions[row], &times[row]) else {
            continue;
        };
        let prediction: f64 = prediction
            .trim()
            .parse()
            .map_err(|_| invalid(PREDICTION, prediction.as_str()))?;
        let prediction_time = parse_millis(PREDICTION_TIME, time.trim())
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| invalid(PREDICTION_TIME, time.as_str()))?
            .naive_utc();
        let actual_rides = match actuals.as_ref().and_then(|a| a[row].as_ref()) {
            Some(value) => Some(
                value
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| invalid(ACTUAL_RIDES, value.as_str()))?,
            ),
            None => None,
        };
        let location = locations
            .as_ref()
            .and_then(|l| l[row].clone())
            .unwrap_or_else(|| location_id.to_string());
        records.push(PredictionRecord {
            location_id: location,
            prediction,
            prediction_time,
            actual_rides,
        });
    }
    records.sort_by_key(|r| r.prediction_time);
    Ok(records)
}

/// Fills `actual_rides` from an hourly long series (`pickup_hour`, `location_id`, `target`)
/// and returns how many records were matched.
pub fn attach_actuals(
    records: &mut [PredictionRecord],
    series: &DataFrame,
) -> Result<usize, ServingError> {
    let hours = column_to_millis(series.column(PICKUP_HOUR)?)?;
    let locations = series.column(LOCATION_ID)?.cast(&DataType::String)?;
    let targets = series.column(TARGET)?.cast(&DataType::Float64)?;

    let mut observed: HashMap<(String, i64), f64> = HashMap::new();
    for ((hour, location), target) in hours
        .into_iter()
        .zip(locations.str()?.into_iter())
        .zip(targets.f64()?.into_iter())
    {
        if let (Some(hour), Some(location), Some(target)) = (hour, location, target) {
            observed.insert((location.to_string(), hour), target);
        }
    }

    let mut matched = 0;
    for record in records.iter_mut() {
        let key = (
            record.location_id.clone(),
            record.prediction_time.and_utc().timestamp_millis(),
        );
        if let Some(&actual) = observed.get(&key) {
            record.actual_rides = Some(actual);
            matched += 1;
        }
    }
    debug!("Matched {} of {} predictions with actuals", matched, records.len());
    Ok(matched)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn hour(h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn record(station: &str, h: u32, prediction: f64) -> PredictionRecord {
        PredictionRecord {
            location_id: station.to_string(),
            prediction,
            prediction_time: hour(h),
            actual_rides: None,
        }
    }

    #[test]
    fn test_append_merges_newest_wins_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        append_predictions(dir.path(), &[record("HB102", 5, 1.0), record("HB102", 3, 2.0)])
            .unwrap();
        let written = append_predictions(
            dir.path(),
            &[record("HB102", 5, 9.0), record("JC115", 4, 4.0)],
        )
        .unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("location_HB102.csv").exists());

        let stored = load_predictions(dir.path(), "HB102").unwrap();
        let summary: Vec<(NaiveDateTime, f64)> = stored
            .iter()
            .map(|r| (r.prediction_time, r.prediction))
            .collect();
        assert_eq!(summary, [(hour(3), 2.0), (hour(5), 9.0)]);
        assert!(stored.iter().all(|r| r.actual_rides.is_none()));
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_predictions(dir.path(), "HB105").unwrap().is_empty());
    }

    #[test]
    fn test_location_from_file_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            prediction_file(dir.path(), "HB105").unwrap(),
            "prediction,prediction_time,actual_rides\n3.5,2024-03-01 07:00:00,4\n",
        )
        .unwrap();
        let stored = load_predictions(dir.path(), "HB105").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].location_id, "HB105");
        assert_eq!(stored[0].prediction_time, hour(7));
        assert_eq!(stored[0].actual_rides, Some(4.0));
    }

    #[test]
    fn test_invalid_prediction_value() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            prediction_file(dir.path(), "HB105").unwrap(),
            "prediction,prediction_time\nmany,2024-03-01 07:00:00\n",
        )
        .unwrap();
        let err = load_predictions(dir.path(), "HB105").unwrap_err();
        assert!(matches!(err, ServingError::InvalidValue { column, .. } if column == "prediction"));
    }

    #[test]
    fn test_station_ids_cannot_leave_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["../x", "a/b", "..", "", ".hidden", "a\\b", "JC 115"] {
            assert!(
                matches!(
                    prediction_file(dir.path(), bad),
                    Err(ServingError::InvalidStationId(id)) if id == bad
                ),
                "{bad:?} was accepted"
            );
        }
        assert_eq!(
            prediction_file(dir.path(), "JC115.a-b_c").unwrap(),
            dir.path().join("location_JC115.a-b_c.csv")
        );

        let err = append_predictions(dir.path(), &[record("../escape", 1, 1.0)]).unwrap_err();
        assert!(matches!(err, ServingError::InvalidStationId(_)));
        assert!(load_predictions(dir.path(), "a/b").is_err());
    }

    #[test]
    fn test_attach_actuals() {
        let series = df!(
            "pickup_hour" => [hour(3), hour(4)],
            "location_id" => ["HB102", "HB102"],
            "target" => [6.0, 8.0],
        )
        .unwrap();
        let mut records = vec![
            record("HB102", 4, 7.0),
            record("HB102", 9, 1.0),
            record("JC115", 3, 2.0),
        ];
        assert_eq!(attach_actuals(&mut records, &series).unwrap(), 1);
        assert_eq!(records[0].actual_rides, Some(8.0));
        assert_eq!(records[0].absolute_error(), Some(1.0));
        assert_eq!(records[1].actual_rides, None);
        assert_eq!(records[2].actual_rides, None);
    }
}
