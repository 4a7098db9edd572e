use crate::model::error::ModelError;
use crate::model::feature_matrix::FeatureMatrix;
use crate::model::metrics::{mean_absolute_error, root_mean_squared_error};
use crate::model::regressor::Regressor;
use bon::Builder;
use log::info;
use polars::prelude::DataFrame;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// How feature rows are split into training and evaluation sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Builder)]
pub struct TrainingConfig {
    /// Share of rows held out for evaluation, strictly between 0 and 1.
    #[builder(default = 0.2)]
    pub test_size: f64,
    /// Seed for the shuffle; the same seed always produces the same split.
    #[builder(default = 42)]
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Evaluation results recorded with a registered model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub n_train: usize,
    pub n_test: usize,
}

pub struct TrainingReport<M> {
    pub model: M,
    pub metrics: ModelMetrics,
}

/// Shuffles `0..n` with a seeded RNG and returns `(train, test)` index sets.
/// The test set gets `ceil(n * test_size)` rows; both sets are non-empty.
pub fn train_test_split(
    n: usize,
    config: &TrainingConfig,
) -> Result<(Vec<usize>, Vec<usize>), ModelError> {
    if !(config.test_size > 0.0 && config.test_size < 1.0) {
        return Err(ModelError::InvalidTestSize(config.test_size));
    }
    if n < 2 {
        return Err(ModelError::NotEnoughRows(n));
    }
    let n_test = ((n as f64 * config.test_size).ceil() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok((train, indices))
}

/// Fits `model` on a shuffled training share of `frame` and scores it on the rest.
pub fn train_and_evaluate<M: Regressor>(
    mut model: M,
    frame: &DataFrame,
    config: &TrainingConfig,
) -> Result<TrainingReport<M>, ModelError> {
    let matrix = FeatureMatrix::from_frame(frame)?;
    matrix.targets()?;
    let (train_idx, test_idx) = train_test_split(matrix.len(), config)?;
    let train = matrix.select_rows(&train_idx)?;
    let test = matrix.select_rows(&test_idx)?;

    model.fit(&train)?;
    let predicted = model.predict(&test)?;
    let actual = test.targets()?.to_vec();
    let mismatch = || ModelError::PredictionCountMismatch {
        expected: actual.len(),
        got: predicted.len(),
    };

    let metrics = ModelMetrics {
        mae: mean_absolute_error(&actual, &predicted).ok_or_else(mismatch)?,
        rmse: root_mean_squared_error(&actual, &predicted).ok_or_else(mismatch)?,
        n_train: train.len(),
        n_test: test.len(),
    };
    info!(
        "Trained {} on {} rows, MAE {:.3} on {} held-out rows",
        model.name(),
        metrics.n_train,
        metrics.mae,
        metrics.n_test
    );
    Ok(TrainingReport { model, metrics })
}
