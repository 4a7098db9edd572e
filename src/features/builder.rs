//! Turns a raw per-station ride-count series into a supervised-learning table of lag
//! features, calendar features and an aligned `target` column.

use crate::features::calendar::CalendarFeatures;
use crate::features::error::FeatureError;
use crate::features::timestamps::{column_to_millis, HOUR_MS};
use crate::types::series_layout::{SeriesLayout, LOCATION_ID, PICKUP_HOUR, TARGET};
use bon::Builder;
use log::{debug, info, warn};
use polars::prelude::*;
use std::collections::BTreeMap;

/// Number of hourly lags produced when no other window is configured.
pub const DEFAULT_MAX_LAG: u32 = 48;

pub const HOUR: &str = "hour";
pub const DAY_OF_WEEK: &str = "dayofweek";
pub const IS_WEEKEND: &str = "is_weekend";

/// Name of the column holding the value observed `lag` hours earlier.
pub fn lag_column(lag: u32) -> String {
    format!("lag_{lag}")
}

/// Builds lag/calendar feature tables per station.
///
/// Lags are looked up by timestamp, not by row position: `lag_k` at hour `t` is the count
/// recorded at `t - k hours`. A series with missing hours therefore yields missing lags for
/// the affected rows, and those rows are dropped instead of silently misaligned. With a
/// gap-free hourly series of `N` rows a station produces `N - max_lag` rows.
///
/// # Examples
///
/// ```
/// use polars::prelude::*;
/// use ridecast::{FeatureBuilder, SeriesLayout};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let hours: Vec<String> = (0..60)
///     .map(|h| format!("2024-01-{:02} {:02}:00:00", 1 + h / 24, h % 24))
///     .collect();
/// let series = df!(
///     "pickup_hour" => hours,
///     "location_id" => vec!["A"; 60],
///     "target" => (0..60).map(|v| v as f64).collect::<Vec<_>>(),
/// )?;
///
/// let tables = FeatureBuilder::default().build(&series, &SeriesLayout::long(), &["A", "B"])?;
/// assert_eq!(tables["A"].height(), 12);
/// assert!(!tables.contains_key("B"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Builder)]
pub struct FeatureBuilder {
    /// How many hourly lags to add (`lag_1` .. `lag_<max_lag>`).
    #[builder(default = DEFAULT_MAX_LAG)]
    max_lag: u32,
}

impl Default for FeatureBuilder {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl FeatureBuilder {
    pub fn max_lag(&self) -> u32 {
        self.max_lag
    }

    /// Names of the model input columns in the order they appear in every output table.
    pub fn feature_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = (1..=self.max_lag).map(lag_column).collect();
        columns.extend([HOUR, DAY_OF_WEEK, IS_WEEKEND].map(String::from));
        columns
    }

    /// Builds one feature table per requested station.
    ///
    /// Every table has the columns `pickup_hour`, `location_id`, `target`, `lag_1` ..
    /// `lag_<max_lag>`, `hour`, `dayofweek` and `is_weekend`, sorted by `pickup_hour`.
    ///
    /// Station ids that have no rows in `series` are left out of the returned map and a
    /// warning is logged; callers that need every station must check for the key. A station
    /// that exists but has too little history to fill a lag window maps to an empty table.
    ///
    /// # Errors
    ///
    /// * [`FeatureError::NoStations`] if `station_ids` is empty.
    /// * [`FeatureError::MissingColumn`] if `series` lacks the timestamp column, or, for the
    ///   long layout, the station or value column.
    /// * [`FeatureError::InvalidTimestamp`] / [`FeatureError::UnsupportedTimestampType`] if the
    ///   timestamp column cannot be read as timestamps.
    pub fn build<S: AsRef<str>>(
        &self,
        series: &DataFrame,
        layout: &SeriesLayout,
        station_ids: &[S],
    ) -> Result<BTreeMap<String, DataFrame>, FeatureError> {
        if station_ids.is_empty() {
            return Err(FeatureError::NoStations);
        }
        if self.max_lag == 0 {
            return Err(FeatureError::EmptyLagWindow);
        }
        check_shape(series, layout)?;

        let mut tables = BTreeMap::new();
        for station in station_ids.iter().map(AsRef::as_ref) {
            info!("Processing station {}", station);
            let Some(observations) = select_station(series, layout, station)? else {
                warn!("No rows found for station {}, skipping", station);
                continue;
            };
            let table = self.station_table(station, &observations)?;
            if table.height() == 0 {
                warn!(
                    "Station {} has {} observations, not enough to fill a {}-hour lag window",
                    station,
                    observations.len(),
                    self.max_lag
                );
            }
            tables.insert(station.to_string(), table);
        }
        Ok(tables)
    }

    /// Runs [`FeatureBuilder::build`] and stacks the per-station tables into one frame,
    /// ordered by station id and then hour.
    pub fn build_combined<S: AsRef<str>>(
        &self,
        series: &DataFrame,
        layout: &SeriesLayout,
        station_ids: &[S],
    ) -> Result<DataFrame, FeatureError> {
        let tables = self.build(series, layout, station_ids)?;
        self.concat(&tables)
    }

    /// Stacks per-station tables; an empty map yields an empty frame with the full schema.
    pub fn concat(&self, tables: &BTreeMap<String, DataFrame>) -> Result<DataFrame, FeatureError> {
        let mut frames = tables.values();
        let Some(first) = frames.next() else {
            return self.station_table("", &BTreeMap::new());
        };
        let mut combined = first.clone();
        for frame in frames {
            combined.vstack_mut(frame)?;
        }
        Ok(combined)
    }

    fn station_table(
        &self,
        station: &str,
        observations: &BTreeMap<i64, Option<f64>>,
    ) -> Result<DataFrame, FeatureError> {
        let lag_count = self.max_lag as usize;
        let mut hours = Vec::new();
        let mut targets = Vec::new();
        let mut lags: Vec<Vec<f64>> = vec![Vec::new(); lag_count];
        let mut hour_of_day = Vec::new();
        let mut day_of_week = Vec::new();
        let mut is_weekend = Vec::new();
        let mut window = Vec::with_capacity(lag_count);

        for (&pickup_hour, &target) in observations {
            let Some(target) = target else {
                continue;
            };
            window.clear();
            for lag in 1..=self.max_lag as i64 {
                match observations.get(&(pickup_hour - lag * HOUR_MS)).copied().flatten() {
                    Some(value) => window.push(value),
                    None => break,
                }
            }
            if window.len() < lag_count {
                continue;
            }
            let Some(calendar) = CalendarFeatures::from_millis(pickup_hour) else {
                continue;
            };

            hours.push(pickup_hour);
            targets.push(target);
            for (column, value) in lags.iter_mut().zip(&window) {
                column.push(*value);
            }
            hour_of_day.push(calendar.hour);
            day_of_week.push(calendar.day_of_week);
            is_weekend.push(calendar.is_weekend);
        }
        debug!(
            "Station {}: {} of {} observations have a full lag window",
            station,
            hours.len(),
            observations.len()
        );

        let height = hours.len();
        let polars_err = |source| FeatureError::Polars {
            station: station.to_string(),
            source,
        };

        let mut columns: Vec<Column> = Vec::with_capacity(lag_count + 6);
        columns.push(
            Series::new(PICKUP_HOUR.into(), hours)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .map_err(polars_err)?
                .into(),
        );
        columns.push(Column::new(LOCATION_ID.into(), vec![station; height]));
        columns.push(Column::new(TARGET.into(), targets));
        for (lag, values) in (1..=self.max_lag).zip(lags) {
            columns.push(Column::new(lag_column(lag).into(), values));
        }
        columns.push(Column::new(HOUR.into(), hour_of_day));
        columns.push(Column::new(DAY_OF_WEEK.into(), day_of_week));
        columns.push(Column::new(IS_WEEKEND.into(), is_weekend));

        DataFrame::new(columns).map_err(polars_err)
    }
}

fn check_shape(series: &DataFrame, layout: &SeriesLayout) -> Result<(), FeatureError> {
    let required: Vec<&str> = match layout {
        SeriesLayout::Wide { time_column } => vec![time_column.as_str()],
        SeriesLayout::Long {
            time_column,
            station_column,
            value_column,
        } => vec![
            time_column.as_str(),
            station_column.as_str(),
            value_column.as_str(),
        ],
    };
    for column in required {
        if series.get_column_index(column).is_none() {
            return Err(FeatureError::MissingColumn {
                column: column.to_string(),
                layout: layout.clone(),
            });
        }
    }
    Ok(())
}

/// Extracts one station's observations keyed by hour. `None` when the station has no rows.
/// If a station reports the same hour twice, the later row wins.
fn select_station(
    series: &DataFrame,
    layout: &SeriesLayout,
    station: &str,
) -> Result<Option<BTreeMap<i64, Option<f64>>>, FeatureError> {
    let polars_err = |source| FeatureError::Polars {
        station: station.to_string(),
        source,
    };

    let (subset, value_column) = match layout {
        SeriesLayout::Wide { time_column } => {
            if series.get_column_index(station).is_none() {
                return Ok(None);
            }
            let subset = series
                .select([time_column.as_str(), station])
                .map_err(polars_err)?;
            (subset, station)
        }
        SeriesLayout::Long {
            time_column,
            station_column,
            value_column,
        } => {
            let subset = series
                .clone()
                .lazy()
                .filter(col(station_column.as_str()).cast(DataType::String).eq(lit(station)))
                .select([col(time_column.as_str()), col(value_column.as_str())])
                .collect()
                .map_err(polars_err)?;
            (subset, value_column.as_str())
        }
    };
    if subset.height() == 0 {
        return Ok(None);
    }

    let hours = column_to_millis(subset.column(layout.time_column()).map_err(polars_err)?)?;
    let values = subset
        .column(value_column)
        .and_then(|c| c.cast(&DataType::Float64))
        .map_err(polars_err)?;
    let values = values.as_materialized_series().f64().map_err(polars_err)?;

    let mut observations = BTreeMap::new();
    for (hour, value) in hours.into_iter().zip(values.into_iter()) {
        if let Some(hour) = hour {
            observations.insert(hour, value);
        }
    }
    Ok(Some(observations))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, NaiveDateTime};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn hours_from_start(hours: impl IntoIterator<Item = i64>) -> Vec<NaiveDateTime> {
        hours
            .into_iter()
            .map(|h| start() + chrono::Duration::hours(h))
            .collect()
    }

    fn long_series(station: &str, hours: &[i64]) -> DataFrame {
        df!(
            "pickup_hour" => hours_from_start(hours.iter().copied()),
            "location_id" => vec![station; hours.len()],
            "target" => hours.iter().map(|&h| h as f64).collect::<Vec<_>>(),
        )
        .unwrap()
    }

    fn f64_at(df: &DataFrame, column: &str, row: usize) -> f64 {
        df.column(column).unwrap().f64().unwrap().get(row).unwrap()
    }

    fn i32_at(df: &DataFrame, column: &str, row: usize) -> i32 {
        df.column(column).unwrap().i32().unwrap().get(row).unwrap()
    }

    #[test]
    fn test_sixty_hours_produce_twelve_rows() {
        let hours: Vec<i64> = (0..60).collect();
        let series = long_series("A", &hours);
        let tables = FeatureBuilder::default()
            .build(&series, &SeriesLayout::long(), &["A"])
            .unwrap();

        let table = &tables["A"];
        assert_eq!(table.height(), 12);
        assert_eq!(table.width(), 3 + 48 + 3);

        // First row is hour 48 = 2024-01-03T00:00, a Wednesday.
        assert_eq!(f64_at(table, "target", 0), 48.0);
        assert_eq!(f64_at(table, "lag_1", 0), 47.0);
        assert_eq!(f64_at(table, "lag_48", 0), 0.0);
        assert_eq!(i32_at(table, "hour", 0), 0);
        let wednesday = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(
            i32_at(table, "dayofweek", 0),
            wednesday.weekday().num_days_from_monday() as i32
        );
        assert_eq!(
            table.column("is_weekend").unwrap().bool().unwrap().get(0),
            Some(false)
        );
        assert_eq!(f64_at(table, "target", 11), 59.0);
    }

    #[test]
    fn test_every_lag_matches_earlier_target() {
        let hours: Vec<i64> = (0..70).collect();
        let series = long_series("A", &hours);
        let table = FeatureBuilder::default()
            .build(&series, &SeriesLayout::long(), &["A"])
            .unwrap()
            .remove("A")
            .unwrap();

        for row in 0..table.height() {
            let target = f64_at(&table, "target", row);
            for lag in 1..=48u32 {
                assert_eq!(f64_at(&table, &lag_column(lag), row), target - lag as f64);
            }
        }
    }

    #[test]
    fn test_gap_drops_rows_instead_of_misaligning() {
        // Hour 60 is missing: rows for hours 61..=108 would need it as a lag.
        let hours: Vec<i64> = (0..120).filter(|&h| h != 60).collect();
        let series = long_series("A", &hours);
        let table = FeatureBuilder::default()
            .build(&series, &SeriesLayout::long(), &["A"])
            .unwrap()
            .remove("A")
            .unwrap();

        let targets: Vec<f64> = table
            .column("target")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        let expected: Vec<f64> = (48..60).chain(109..120).map(|h| h as f64).collect();
        assert_eq!(targets, expected);
        // Lag lookups after the gap are still timestamp-aligned.
        let after_gap = targets.iter().position(|&t| t == 109.0).unwrap();
        assert_eq!(f64_at(&table, "lag_1", after_gap), 108.0);
        assert_eq!(f64_at(&table, "lag_48", after_gap), 61.0);
    }

    #[test]
    fn test_missing_station_is_skipped() {
        let hours: Vec<i64> = (0..60).collect();
        let series = long_series("A", &hours);
        let tables = FeatureBuilder::default()
            .build(&series, &SeriesLayout::long(), &["A", "B"])
            .unwrap();
        assert_eq!(tables.keys().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn test_short_history_gives_empty_table() {
        let hours: Vec<i64> = (0..48).collect();
        let series = long_series("A", &hours);
        let tables = FeatureBuilder::default()
            .build(&series, &SeriesLayout::long(), &["A"])
            .unwrap();
        assert_eq!(tables["A"].height(), 0);
        assert_eq!(tables["A"].width(), 54);
    }

    #[test]
    fn test_wide_layout() {
        let hours: Vec<i64> = (0..52).collect();
        let series = df!(
            "pickup_hour" => hours_from_start(hours.iter().copied()),
            "HB102" => hours.iter().map(|&h| h * 2).collect::<Vec<i64>>(),
            "JC115" => hours.iter().map(|&h| h as i32).collect::<Vec<i32>>(),
        )
        .unwrap();
        let tables = FeatureBuilder::default()
            .build(&series, &SeriesLayout::wide(), &["HB102", "JC115", "HB105"])
            .unwrap();

        assert_eq!(tables.len(), 2);
        assert_eq!(tables["HB102"].height(), 4);
        assert_eq!(f64_at(&tables["HB102"], "target", 0), 96.0);
        assert_eq!(f64_at(&tables["HB102"], "lag_2", 0), 92.0);
        assert_eq!(f64_at(&tables["JC115"], "lag_48", 3), 3.0);
        let ids = tables["JC115"].column("location_id").unwrap();
        assert_eq!(ids.str().unwrap().get(0), Some("JC115"));
    }

    #[test]
    fn test_string_timestamps_and_unsorted_rows() {
        let mut hours: Vec<i64> = (0..50).collect();
        hours.reverse();
        let series = df!(
            "pickup_hour" => hours_from_start(hours.iter().copied())
                .iter()
                .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                .collect::<Vec<_>>(),
            "location_id" => vec!["A"; hours.len()],
            "target" => hours.iter().map(|&h| h as f64).collect::<Vec<_>>(),
        )
        .unwrap();
        let table = FeatureBuilder::default()
            .build(&series, &SeriesLayout::long(), &["A"])
            .unwrap()
            .remove("A")
            .unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(f64_at(&table, "target", 0), 48.0);
        assert_eq!(f64_at(&table, "target", 1), 49.0);
    }

    #[test]
    fn test_missing_value_column_is_shape_error() {
        let series = df!(
            "pickup_hour" => hours_from_start(0..3),
            "location_id" => ["A", "A", "A"],
        )
        .unwrap();
        let err = FeatureBuilder::default()
            .build(&series, &SeriesLayout::long(), &["A"])
            .unwrap_err();
        match err {
            FeatureError::MissingColumn { column, .. } => assert_eq!(column, "target"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_empty_station_list_is_rejected() {
        let series = long_series("A", &[0, 1]);
        let none: [&str; 0] = [];
        assert!(matches!(
            FeatureBuilder::default().build(&series, &SeriesLayout::long(), &none),
            Err(FeatureError::NoStations)
        ));
    }

    #[test]
    fn test_build_is_deterministic() {
        let hours: Vec<i64> = (0..80).collect();
        let mut series = long_series("A", &hours);
        series.vstack_mut(&long_series("B", &hours)).unwrap();
        let builder = FeatureBuilder::builder().max_lag(24).build();

        let first = builder
            .build_combined(&series, &SeriesLayout::long(), &["B", "A"])
            .unwrap();
        let second = builder
            .build_combined(&series, &SeriesLayout::long(), &["B", "A"])
            .unwrap();
        assert_eq!(first.height(), 2 * (80 - 24));
        assert!(first.equals(&second));
        assert_eq!(
            first.column("location_id").unwrap().str().unwrap().get(0),
            Some("A")
        );
    }

    #[test]
    fn test_concat_of_nothing_keeps_schema() {
        let builder = FeatureBuilder::builder().max_lag(3).build();
        let empty = builder.concat(&BTreeMap::new()).unwrap();
        assert_eq!(empty.height(), 0);
        assert_eq!(
            empty.get_column_names_str(),
            vec![
                "pickup_hour",
                "location_id",
                "target",
                "lag_1",
                "lag_2",
                "lag_3",
                "hour",
                "dayofweek",
                "is_weekend"
            ]
        );
    }
}
