//! The client that runs the pipeline steps against a local data directory: downloading
//! trip archives, aggregating hourly ride counts, building and storing features, training
//! and registering a model, serving next-hour predictions and monitoring them.

use crate::error::RidecastError;
use crate::features::builder::FeatureBuilder;
use crate::model::registry::{LocalModelRegistry, ModelRegistry, ModelVersion, RegisteredModel};
use crate::model::regressor::Regressor;
use crate::model::training::{train_and_evaluate, TrainingReport};
use crate::monitoring::{summarize, MonitoringSummary};
use crate::serving::prediction_csv::{append_predictions, attach_actuals, load_predictions};
use crate::serving::predictor::{predict_next_hour, records_from_frame};
use crate::store::feature_store::{FeatureStore, ParquetFeatureStore};
use crate::trip_data::downloader::TripDownloader;
use crate::trip_data::time_series::hourly_rides;
use crate::types::config::PipelineConfig;
use crate::types::series_layout::SeriesLayout;
use crate::utils::{ensure_dir_exists, get_data_dir, DataDirs};
use bon::bon;
use log::{info, warn};
use polars::prelude::DataFrame;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::task;

/// Runs the bike-demand pipeline with one [`PipelineConfig`].
///
/// Every step reads from and writes to the data directory, so the steps can run in separate
/// processes as long as they share the configuration.
///
/// # Examples
///
/// ```rust,no_run
/// # use ridecast::{GradientBoostingRegressor, ModelVersion, PipelineConfig, Ridecast, RidecastError};
/// # async fn run() -> Result<(), RidecastError> {
/// let client = Ridecast::new(PipelineConfig::default()).await?;
/// client.download_trips(&["JC-202401", "JC-202402"]).await?;
/// let series = client.hourly_series().call().await?;
/// client.build_features(series).await?;
/// client.train(GradientBoostingRegressor::default()).await?;
/// let predictions = client
///     .predict::<GradientBoostingRegressor>(ModelVersion::Latest)
///     .await?;
/// println!("{predictions}");
/// # Ok(())
/// # }
/// ```
pub struct Ridecast {
    config: PipelineConfig,
    dirs: DataDirs,
    downloader: TripDownloader,
    store: ParquetFeatureStore,
    registry: LocalModelRegistry,
}

#[bon]
impl Ridecast {
    /// Creates the client and the data directory tree (`raw/`, `feature_store/`,
    /// `model_registry/`, `predictions/`) if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`RidecastError::DataDirResolution`] when no data directory is configured and
    /// the platform has none, and [`RidecastError::DataDirCreation`] when a directory cannot
    /// be created.
    pub async fn new(config: PipelineConfig) -> Result<Self, RidecastError> {
        let root = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => get_data_dir().ok_or(RidecastError::DataDirResolution)?,
        };
        let dirs = DataDirs::new(&root);
        for path in dirs.all() {
            ensure_dir_exists(path)
                .await
                .map_err(|e| RidecastError::DataDirCreation(path.to_path_buf(), e))?;
        }

        Ok(Self {
            downloader: TripDownloader::new(config.trip_data_url.clone(), &dirs.raw),
            store: ParquetFeatureStore::new(&dirs.feature_store)?,
            registry: LocalModelRegistry::new(&dirs.model_registry)?,
            dirs,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn dirs(&self) -> &DataDirs {
        &self.dirs
    }

    pub fn store(&self) -> &ParquetFeatureStore {
        &self.store
    }

    pub fn registry(&self) -> &LocalModelRegistry {
        &self.registry
    }

    /// Downloads and extracts the given months (e.g. `JC-202401`) into `raw/`.
    pub async fn download_trips<S: AsRef<str>>(
        &self,
        months: &[S],
    ) -> Result<Vec<PathBuf>, RidecastError> {
        Ok(self.downloader.download_months(months).await?)
    }

    /// Every `.csv` file currently in `raw/`, sorted by name. Dot-files are skipped.
    pub async fn raw_files(&self) -> Result<Vec<PathBuf>, RidecastError> {
        let raw = &self.dirs.raw;
        let mut entries = tokio::fs::read_dir(raw)
            .await
            .map_err(|e| RidecastError::Io(raw.clone(), e))?;
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RidecastError::Io(raw.clone(), e))?
        {
            let path = entry.path();
            let hidden = path
                .file_name()
                .and_then(|f| f.to_str())
                .is_some_and(|f| f.starts_with('.'));
            if !hidden && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv")) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Aggregates raw trips into an hourly long-form series for the configured stations.
    ///
    /// Reads every CSV in `raw/` unless `files` is given. Missing hours are filled with zero
    /// rides unless `fill_missing_hours(false)` is set.
    #[builder]
    pub async fn hourly_series(
        &self,
        files: Option<Vec<PathBuf>>,
        fill_missing_hours: Option<bool>,
    ) -> Result<DataFrame, RidecastError> {
        let files = match files {
            Some(files) => files,
            None => self.raw_files().await?,
        };
        if files.is_empty() {
            return Err(RidecastError::NoRawFiles(self.dirs.raw.clone()));
        }
        let stations = self.config.stations.clone();
        let series = task::spawn_blocking(move || {
            hourly_rides()
                .files(&files)
                .stations(&stations)
                .maybe_fill_missing_hours(fill_missing_hours)
                .call()
        })
        .await??;
        info!(
            "Hourly series has {} rows for {} stations",
            series.height(),
            self.config.stations.len()
        );
        Ok(series)
    }

    /// Builds lag and calendar features for the configured stations from a long-form series
    /// and upserts them into the feature group. Returns the combined feature table.
    pub async fn build_features(&self, series: DataFrame) -> Result<DataFrame, RidecastError> {
        let builder = FeatureBuilder::builder().max_lag(self.config.max_lag).build();
        let stations = self.config.stations.clone();
        let group = self.config.feature_group.clone();
        let store = self.store.clone();

        task::spawn_blocking(move || -> Result<DataFrame, RidecastError> {
            let features = builder.build_combined(&series, &SeriesLayout::long(), &stations)?;
            let stored = store.insert(&group, &features)?;
            info!(
                "Inserted {} feature rows into {} v{} ({} rows stored)",
                features.height(),
                group.name,
                group.version,
                stored
            );
            Ok(features)
        })
        .await?
    }

    /// Trains `model` on the stored feature group, evaluates it on the held-out share and
    /// registers it under the configured model name.
    pub async fn train<M>(
        &self,
        model: M,
    ) -> Result<(RegisteredModel, TrainingReport<M>), RidecastError>
    where
        M: Regressor + Serialize + Send + 'static,
    {
        let group = self.config.feature_group.clone();
        let training = self.config.training;
        let model_name = self.config.model_name.clone();
        let store = self.store.clone();
        let registry = self.registry.clone();

        task::spawn_blocking(move || -> Result<_, RidecastError> {
            let features = store.read(&group.name, group.version)?;
            let report = train_and_evaluate(model, &features, &training)?;
            let record = registry.register(
                &model_name,
                &report.model.name(),
                &report.model,
                &report.metrics,
            )?;
            Ok((record, report))
        })
        .await?
    }

    /// Predicts the next hour for every configured station with a registered model.
    ///
    /// The predictions are upserted into the prediction group and merged into the
    /// per-station CSV files under `predictions/`. Returns the prediction frame
    /// (`location_id`, `prediction`, `prediction_time`).
    pub async fn predict<M>(&self, version: ModelVersion) -> Result<DataFrame, RidecastError>
    where
        M: Regressor + DeserializeOwned + Send + 'static,
    {
        let features_group = self.config.feature_group.clone();
        let prediction_group = self.config.prediction_group.clone();
        let model_name = self.config.model_name.clone();
        let stations = self.config.stations.clone();
        let predictions_dir = self.dirs.predictions.clone();
        let store = self.store.clone();
        let registry = self.registry.clone();

        task::spawn_blocking(move || -> Result<DataFrame, RidecastError> {
            let (record, model): (_, M) = registry.load(&model_name, version)?;
            info!("Loaded {} v{} ({})", record.name, record.version, record.regressor);

            let features = store.read(&features_group.name, features_group.version)?;
            let predictions = predict_next_hour(&model, &features, &stations)?;
            if predictions.height() == 0 {
                warn!("No station had features to predict from");
                return Ok(predictions);
            }
            store.insert(&prediction_group, &predictions)?;
            append_predictions(&predictions_dir, &records_from_frame(&predictions)?)?;
            Ok(predictions)
        })
        .await?
    }

    /// Attaches observed ride counts from `series` to the stored predictions of every
    /// configured station, writes them back and summarizes the errors per station.
    ///
    /// Stations without any prediction that has an actual value are left out.
    pub async fn monitor(
        &self,
        series: DataFrame,
    ) -> Result<BTreeMap<String, MonitoringSummary>, RidecastError> {
        let stations = self.config.stations.clone();
        let predictions_dir = self.dirs.predictions.clone();

        task::spawn_blocking(move || -> Result<_, RidecastError> {
            let mut summaries = BTreeMap::new();
            for station in &stations {
                let mut records = load_predictions(&predictions_dir, station)?;
                if records.is_empty() {
                    warn!("No stored predictions for station {}", station);
                    continue;
                }
                if attach_actuals(&mut records, &series)? > 0 {
                    append_predictions(&predictions_dir, &records)?;
                }
                match summarize(&records) {
                    Some(summary) => {
                        info!(
                            "Station {}: latest error {:.2}, MAE {:.2}, RMSE {:.2} over {} hours",
                            station, summary.latest_error, summary.mae, summary.rmse, summary.n
                        );
                        summaries.insert(station.clone(), summary);
                    }
                    None => warn!("No actual rides yet for station {}", station),
                }
            }
            Ok(summaries)
        })
        .await?
    }
}
