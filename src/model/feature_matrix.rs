use crate::features::builder::{DAY_OF_WEEK, HOUR, IS_WEEKEND};
use crate::model::error::ModelError;
use crate::types::series_layout::TARGET;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use polars::prelude::{DataFrame, DataType};

/// Dense `f64` model inputs taken from a feature table.
///
/// Columns are always ordered `lag_1 .. lag_n` (ascending lag), then `hour`, `dayofweek`,
/// `is_weekend`, regardless of their order in the source frame. The feature array always has
/// one column per name and, when present, one target per row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    features: Array2<f64>,
    targets: Option<Array1<f64>>,
}

impl FeatureMatrix {
    pub fn new(
        columns: Vec<String>,
        features: Array2<f64>,
        targets: Option<Array1<f64>>,
    ) -> Result<Self, ModelError> {
        if features.ncols() != columns.len() {
            return Err(ModelError::ShapeMismatch {
                what: "feature columns",
                expected: columns.len(),
                got: features.ncols(),
            });
        }
        if let Some(targets) = &targets {
            if targets.len() != features.nrows() {
                return Err(ModelError::ShapeMismatch {
                    what: "targets",
                    expected: features.nrows(),
                    got: targets.len(),
                });
            }
        }
        Ok(Self {
            columns,
            features,
            targets,
        })
    }

    /// Selects the lag and calendar columns of `frame` as model features and `target`
    /// (if present) as the label. Booleans become `0.0`/`1.0`.
    pub fn from_frame(frame: &DataFrame) -> Result<Self, ModelError> {
        let mut lags: Vec<(u32, String)> = frame
            .get_column_names_str()
            .into_iter()
            .filter_map(|name| {
                name.strip_prefix("lag_")
                    .and_then(|n| n.parse::<u32>().ok())
                    .map(|lag| (lag, name.to_string()))
            })
            .collect();
        lags.sort_unstable();

        let mut columns: Vec<String> = lags.into_iter().map(|(_, name)| name).collect();
        for calendar in [HOUR, DAY_OF_WEEK, IS_WEEKEND] {
            if frame.get_column_index(calendar).is_none() {
                return Err(ModelError::MissingFeature(calendar.to_string()));
            }
            columns.push(calendar.to_string());
        }

        let mut features = Array2::zeros((frame.height(), columns.len()));
        for (j, name) in columns.iter().enumerate() {
            features
                .column_mut(j)
                .assign(&Array1::from_vec(read_f64(frame, name)?));
        }

        let targets = if frame.get_column_index(TARGET).is_some() {
            Some(Array1::from_vec(read_f64(frame, TARGET)?))
        } else {
            None
        };

        Self::new(columns, features, targets)
    }

    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name).map(|j| self.features.column(j))
    }

    /// Labels, or an error for a matrix built from a frame without `target`.
    pub fn targets(&self) -> Result<&Array1<f64>, ModelError> {
        self.targets
            .as_ref()
            .ok_or_else(|| ModelError::MissingTarget(TARGET.to_string()))
    }

    /// A new matrix holding only the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Result<FeatureMatrix, ModelError> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(ModelError::RowOutOfRange {
                row: bad,
                len: self.len(),
            });
        }
        Ok(FeatureMatrix {
            columns: self.columns.clone(),
            features: self.features.select(Axis(0), indices),
            targets: self.targets.as_ref().map(|t| t.select(Axis(0), indices)),
        })
    }
}

fn read_f64(frame: &DataFrame, name: &str) -> Result<Vec<f64>, ModelError> {
    let column = frame.column(name)?.cast(&DataType::Float64)?;
    column
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| ModelError::MissingValue {
                column: name.to_string(),
                row,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use polars::prelude::*;

    #[test]
    fn test_orders_columns_and_converts_booleans() {
        let frame = df!(
            "location_id" => ["A", "A"],
            "is_weekend" => [true, false],
            "lag_10" => [10.0, 11.0],
            "target" => [5.0, 6.0],
            "lag_2" => [2.0, 3.0],
            "dayofweek" => [5i32, 0],
            "hour" => [1i32, 2],
        )
        .unwrap();
        let matrix = FeatureMatrix::from_frame(&frame).unwrap();

        assert_eq!(
            matrix.columns(),
            ["lag_2", "lag_10", "hour", "dayofweek", "is_weekend"]
        );
        assert_eq!(
            matrix.features(),
            &array![[2.0, 10.0, 1.0, 5.0, 1.0], [3.0, 11.0, 2.0, 0.0, 0.0]]
        );
        assert_eq!(matrix.targets().unwrap(), &array![5.0, 6.0]);
    }

    #[test]
    fn test_missing_calendar_column() {
        let frame = df!("lag_1" => [1.0], "hour" => [1i32]).unwrap();
        let err = FeatureMatrix::from_frame(&frame).unwrap_err();
        assert!(matches!(err, ModelError::MissingFeature(c) if c == "dayofweek"));
    }

    #[test]
    fn test_null_feature_is_rejected() {
        let frame = df!(
            "lag_1" => [Some(1.0), None],
            "hour" => [1i32, 2],
            "dayofweek" => [1i32, 2],
            "is_weekend" => [false, false],
        )
        .unwrap();
        let err = FeatureMatrix::from_frame(&frame).unwrap_err();
        assert!(matches!(err, ModelError::MissingValue { row: 1, .. }));
    }

    #[test]
    fn test_shape_is_checked() {
        let err = FeatureMatrix::new(vec!["lag_1".to_string()], Array2::zeros((1, 0)), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::ShapeMismatch { expected: 1, got: 0, .. }
        ));

        let err = FeatureMatrix::new(
            vec!["lag_1".to_string()],
            Array2::zeros((3, 1)),
            Some(array![1.0]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ModelError::ShapeMismatch { what: "targets", expected: 3, got: 1 }
        ));
    }

    #[test]
    fn test_select_rows() {
        let frame = df!(
            "lag_1" => [1.0, 2.0, 3.0],
            "hour" => [0i32, 1, 2],
            "dayofweek" => [0i32, 0, 0],
            "is_weekend" => [false, false, false],
            "target" => [10.0, 20.0, 30.0],
        )
        .unwrap();
        let matrix = FeatureMatrix::from_frame(&frame).unwrap();
        let picked = matrix.select_rows(&[2, 0]).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked.features()[[0, 0]], 3.0);
        assert_eq!(picked.targets().unwrap(), &array![30.0, 10.0]);
        assert!(matches!(
            matrix.select_rows(&[3]),
            Err(ModelError::RowOutOfRange { row: 3, len: 3 })
        ));
    }
}
