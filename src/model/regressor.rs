//! The seam between the pipeline and whatever regression library fits the model.

use crate::features::builder::lag_column;
use crate::model::error::ModelError;
use crate::model::feature_matrix::FeatureMatrix;
use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// A regression model that maps one feature row to a predicted ride count.
///
/// [`crate::GradientBoostingRegressor`] is the learned model; other libraries plug in by
/// implementing this trait. The registry stores any implementation that is also
/// `Serialize`/`Deserialize`.
pub trait Regressor {
    /// Short identifier recorded alongside registered artifacts.
    fn name(&self) -> String;

    /// Fits the model on `features`, whose `targets` must be present.
    fn fit(&mut self, features: &FeatureMatrix) -> Result<(), ModelError>;

    /// Predicts one value per row of `features`.
    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError>;
}

/// Reference models that need no fitting beyond checking the columns they read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BaselineModel {
    /// Predicts the previous hour's count (`lag_1`).
    PreviousHour,
    /// Predicts the count 24 hours earlier (`lag_24`).
    SameHourYesterday,
    /// Predicts the mean of `lag_1 .. lag_<window>`. The window must be at least 1.
    LagMean { window: u32 },
}

impl BaselineModel {
    fn lag_columns(&self) -> Result<Vec<String>, ModelError> {
        match self {
            BaselineModel::PreviousHour => Ok(vec![lag_column(1)]),
            BaselineModel::SameHourYesterday => Ok(vec![lag_column(24)]),
            BaselineModel::LagMean { window: 0 } => Err(ModelError::InvalidLagWindow(0)),
            BaselineModel::LagMean { window } => Ok((1..=*window).map(lag_column).collect()),
        }
    }

    fn lag_indices(&self, features: &FeatureMatrix) -> Result<Vec<usize>, ModelError> {
        self.lag_columns()?
            .into_iter()
            .map(|name| {
                features
                    .column_index(&name)
                    .ok_or(ModelError::MissingFeature(name))
            })
            .collect()
    }
}

impl Regressor for BaselineModel {
    fn name(&self) -> String {
        match self {
            BaselineModel::PreviousHour => "baseline_previous_hour".to_string(),
            BaselineModel::SameHourYesterday => "baseline_same_hour_yesterday".to_string(),
            BaselineModel::LagMean { window } => format!("baseline_lag_mean_{window}"),
        }
    }

    fn fit(&mut self, features: &FeatureMatrix) -> Result<(), ModelError> {
        self.lag_indices(features)?;
        features.targets().map(|_| ())
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let indices = self.lag_indices(features)?;
        let lags = features.features().select(Axis(1), &indices);
        Ok(match lags.mean_axis(Axis(1)) {
            Some(means) => means.to_vec(),
            None => Vec::new(),
        })
    }
}
