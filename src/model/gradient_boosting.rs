//! Gradient-boosted regression trees on squared error.
//!
//! Each round fits a regression tree to the current residuals on a seeded subsample of rows and
//! columns, then adds its shrunken output to every row's running prediction.

use crate::model::error::ModelError;
use crate::model::feature_matrix::FeatureMatrix;
use crate::model::regressor::Regressor;
use crate::model::tree::{TreeNode, TreeParams};
use bon::Builder;
use log::debug;
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Builder)]
pub struct GradientBoostingConfig {
    /// Number of boosting rounds.
    #[builder(default = 100)]
    pub n_estimators: usize,
    /// Shrinkage applied to every tree's output.
    #[builder(default = 0.1)]
    pub learning_rate: f64,
    #[builder(default = 4)]
    pub max_depth: usize,
    #[builder(default = 5)]
    pub min_samples_leaf: usize,
    /// Share of rows each tree is fitted on, in `(0, 1]`.
    #[builder(default = 0.8)]
    pub subsample: f64,
    /// Share of columns each tree may split on, in `(0, 1]`.
    #[builder(default = 0.8)]
    pub colsample_bytree: f64,
    #[builder(default = 42)]
    pub seed: u64,
}

impl Default for GradientBoostingConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GradientBoostingConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        let invalid = |msg: String| Err(ModelError::InvalidConfig(msg));
        if self.n_estimators == 0 {
            return invalid("n_estimators must be at least 1".to_string());
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return invalid(format!("learning_rate must be positive, got {}", self.learning_rate));
        }
        if self.max_depth == 0 {
            return invalid("max_depth must be at least 1".to_string());
        }
        if self.min_samples_leaf == 0 {
            return invalid("min_samples_leaf must be at least 1".to_string());
        }
        for (name, ratio) in [
            ("subsample", self.subsample),
            ("colsample_bytree", self.colsample_bytree),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return invalid(format!("{name} must lie in (0, 1], got {ratio}"));
            }
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// The learned next-hour demand model.
///
/// Serializable, so a fitted model can go straight into a [`crate::ModelRegistry`]. It
/// remembers the column order it was fitted on and refuses matrices laid out differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    config: GradientBoostingConfig,
    columns: Vec<String>,
    initial_prediction: f64,
    trees: Vec<TreeNode>,
}

impl GradientBoostingRegressor {
    pub fn new(config: GradientBoostingConfig) -> Self {
        Self {
            config,
            columns: Vec::new(),
            initial_prediction: 0.0,
            trees: Vec::new(),
        }
    }

    pub fn config(&self) -> &GradientBoostingConfig {
        &self.config
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Column names seen during `fit`, empty before the first fit.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self::new(GradientBoostingConfig::default())
    }
}

/// `ceil(n * ratio)` distinct indices, ascending. At least one when `n > 0`.
fn sample_indices(n: usize, ratio: f64, rng: &mut ChaCha8Rng) -> Vec<usize> {
    let size = ((n as f64 * ratio).ceil() as usize).clamp(n.min(1), n);
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    indices.truncate(size);
    indices.sort_unstable();
    indices
}

impl Regressor for GradientBoostingRegressor {
    fn name(&self) -> String {
        "gradient_boosting".to_string()
    }

    fn fit(&mut self, features: &FeatureMatrix) -> Result<(), ModelError> {
        self.config.validate()?;
        let targets = features.targets()?;
        if features.is_empty() {
            return Err(ModelError::NotEnoughRows(0));
        }
        let x = features.features();
        let (n_rows, n_cols) = x.dim();
        let params = self.config.tree_params();

        let initial = targets.mean().unwrap_or(0.0);
        let mut predictions = Array1::from_elem(n_rows, initial);
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            let residuals = targets - &predictions;
            let rows = sample_indices(n_rows, self.config.subsample, &mut rng);
            let cols = sample_indices(n_cols, self.config.colsample_bytree, &mut rng);
            let tree = TreeNode::fit(x, &residuals, &rows, &cols, params);

            for (prediction, row) in predictions.iter_mut().zip(x.rows()) {
                *prediction += self.config.learning_rate * tree.predict_row(row);
            }
            trees.push(tree);
        }

        let residual_mae = (targets - &predictions).mapv(f64::abs).mean().unwrap_or(0.0);
        debug!(
            "Fitted {} trees on {} rows x {} columns, training MAE {:.3}",
            trees.len(),
            n_rows,
            n_cols,
            residual_mae
        );

        self.columns = features.columns().to_vec();
        self.initial_prediction = initial;
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        if !self.is_fitted() {
            return Err(ModelError::NotFitted(self.name()));
        }
        if features.columns() != self.columns.as_slice() {
            return Err(ModelError::ColumnMismatch {
                expected: self.columns.clone(),
                got: features.columns().to_vec(),
            });
        }
        Ok(features
            .features()
            .rows()
            .into_iter()
            .map(|row| {
                let boost: f64 = self.trees.iter().map(|tree| tree.predict_row(row)).sum();
                self.initial_prediction + self.config.learning_rate * boost
            })
            .collect())
    }
}
