//! Reads a timestamp-like column into epoch milliseconds, whatever form it arrives in.

use crate::features::error::FeatureError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use polars::prelude::{Column, DataType, TimeUnit};

pub(crate) const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Converts a datetime, date, integer or string column into epoch milliseconds (UTC-naive).
/// Nulls stay `None`; strings that parse as none of the accepted formats are an error.
pub(crate) fn column_to_millis(column: &Column) -> Result<Vec<Option<i64>>, FeatureError> {
    let name = column.name().to_string();
    match column.dtype() {
        DataType::Datetime(unit, _) => {
            let per_milli = match unit {
                TimeUnit::Nanoseconds => 1_000_000,
                TimeUnit::Microseconds => 1_000,
                TimeUnit::Milliseconds => 1,
            };
            let physical = column.cast(&DataType::Int64)?;
            Ok(physical
                .as_materialized_series()
                .i64()?
                .into_iter()
                .map(|v| v.map(|v| v.div_euclid(per_milli)))
                .collect())
        }
        DataType::Date => {
            let days = column.cast(&DataType::Int32)?;
            Ok(days
                .as_materialized_series()
                .i32()?
                .into_iter()
                .map(|v| v.map(|d| d as i64 * DAY_MS))
                .collect())
        }
        DataType::Int64 => Ok(column.as_materialized_series().i64()?.into_iter().collect()),
        DataType::String => column
            .as_materialized_series()
            .str()?
            .into_iter()
            .map(|v| v.map(|s| parse_millis(&name, s)).transpose())
            .collect(),
        other => Err(FeatureError::UnsupportedTimestampType {
            column: name,
            dtype: other.to_string(),
        }),
    }
}

pub(crate) fn parse_millis(column: &str, value: &str) -> Result<i64, FeatureError> {
    let trimmed = value.trim();
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed.and_utc().timestamp_millis());
        }
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.timestamp_millis());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN).and_utc().timestamp_millis());
    }
    Err(FeatureError::InvalidTimestamp {
        column: column.to_string(),
        value: value.to_string(),
    })
}

/// Floors epoch milliseconds to the start of their hour.
pub(crate) fn floor_to_hour(millis: i64) -> i64 {
    millis - millis.rem_euclid(HOUR_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_parses_common_string_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 3)
            .unwrap()
            .and_hms_opt(5, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        for value in [
            "2024-01-03 05:00:00",
            "2024-01-03T05:00:00",
            "2024-01-03 05:00",
            "2024-01-03 05:00:00.000",
            "2024-01-03T05:00:00Z",
        ] {
            assert_eq!(parse_millis("t", value).unwrap(), expected, "{value}");
        }
    }

    #[test]
    fn test_rejects_garbage() {
        let err = parse_millis("pickup_hour", "yesterday").unwrap_err();
        assert!(matches!(err, FeatureError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_datetime_units_normalise_to_millis() {
        let base = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        let ms = base.and_utc().timestamp_millis();
        let micros = Series::new("t".into(), &[ms * 1_000])
            .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
            .unwrap();
        let column: Column = micros.into();
        assert_eq!(column_to_millis(&column).unwrap(), vec![Some(ms)]);
    }

    #[test]
    fn test_floor_to_hour() {
        assert_eq!(floor_to_hour(HOUR_MS + 59_999), HOUR_MS);
        assert_eq!(floor_to_hour(2 * HOUR_MS), 2 * HOUR_MS);
    }
}
