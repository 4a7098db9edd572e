//! Describes how a raw ride-count table is shaped, so the Feature Builder knows where
//! to find timestamps, station identifiers and counts.

use std::fmt;

/// Column holding the hour a row refers to, in both layouts and in every output table.
pub const PICKUP_HOUR: &str = "pickup_hour";
/// Column holding the station identifier in long-form input and in every output table.
pub const LOCATION_ID: &str = "location_id";
/// Canonical name of the ride count column once a station's series is selected.
pub const TARGET: &str = "target";

/// The shape of a time-indexed ride-count table.
///
/// # Examples
///
/// ```
/// use ridecast::SeriesLayout;
///
/// // One column per station, e.g. `pickup_hour | HB102 | JC115`
/// let wide = SeriesLayout::wide();
///
/// // One row per (hour, station), e.g. `pickup_hour | location_id | target`
/// let long = SeriesLayout::long();
///
/// assert_eq!(wide.time_column(), long.time_column());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SeriesLayout {
    /// A timestamp column plus one ride-count column per station identifier,
    /// where the column name is the station identifier.
    Wide {
        /// Name of the timestamp column.
        time_column: String,
    },
    /// A timestamp column, a station identifier column and a ride-count column.
    Long {
        /// Name of the timestamp column.
        time_column: String,
        /// Name of the column holding station identifiers.
        station_column: String,
        /// Name of the column holding ride counts.
        value_column: String,
    },
}

impl SeriesLayout {
    /// Wide layout keyed by the `pickup_hour` column.
    pub fn wide() -> Self {
        SeriesLayout::Wide {
            time_column: PICKUP_HOUR.to_string(),
        }
    }

    /// Long layout with `pickup_hour`, `location_id` and `target` columns, which is what
    /// [`crate::hourly_rides`] produces.
    pub fn long() -> Self {
        SeriesLayout::Long {
            time_column: PICKUP_HOUR.to_string(),
            station_column: LOCATION_ID.to_string(),
            value_column: TARGET.to_string(),
        }
    }

    pub fn time_column(&self) -> &str {
        match self {
            SeriesLayout::Wide { time_column } => time_column,
            SeriesLayout::Long { time_column, .. } => time_column,
        }
    }
}

impl fmt::Display for SeriesLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeriesLayout::Wide { .. } => write!(f, "wide"),
            SeriesLayout::Long { .. } => write!(f, "long"),
        }
    }
}
