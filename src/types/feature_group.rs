//! Declarations of the keyed, versioned tables handed to a [`crate::FeatureStore`].

use crate::types::series_layout::{LOCATION_ID, PICKUP_HOUR};

/// Column holding the hour a prediction refers to.
pub const PREDICTION_TIME: &str = "prediction_time";

/// A named, versioned table with a composite primary key.
///
/// # Examples
///
/// ```
/// use ridecast::FeatureGroup;
///
/// let group = FeatureGroup::features();
/// assert_eq!(group.name, "citi_bike_features");
/// assert_eq!(group.primary_key, ["pickup_hour", "location_id"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGroup {
    pub name: String,
    pub version: u32,
    pub primary_key: Vec<String>,
    pub description: String,
    /// Column that orders rows in time, if the group has one.
    pub event_time: Option<String>,
}

impl FeatureGroup {
    pub fn new(name: impl Into<String>, version: u32, primary_key: &[&str]) -> Self {
        Self {
            name: name.into(),
            version,
            primary_key: primary_key.iter().map(|c| c.to_string()).collect(),
            description: String::new(),
            event_time: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_event_time(mut self, column: impl Into<String>) -> Self {
        self.event_time = Some(column.into());
        self
    }

    /// The lag/calendar feature table, keyed by `(pickup_hour, location_id)`.
    pub fn features() -> Self {
        FeatureGroup::new("citi_bike_features", 2, &[PICKUP_HOUR, LOCATION_ID])
            .with_description("Time series features for Citi Bike predictions")
            .with_event_time(PICKUP_HOUR)
    }

    /// The served predictions, keyed by `(location_id, prediction_time)`.
    pub fn predictions() -> Self {
        FeatureGroup::new("citi_bike_predictions", 1, &[LOCATION_ID, PREDICTION_TIME])
            .with_description("Predicted rides per location")
            .with_event_time(PREDICTION_TIME)
    }
}
