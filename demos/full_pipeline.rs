use ridecast::{
    GradientBoostingConfig, GradientBoostingRegressor, ModelVersion, PipelineConfig, Ridecast,
    RidecastError,
};
use std::env;

/// Downloads two months of Jersey City trips, builds features, trains a gradient-boosted
/// model, and predicts the next hour for the default stations.
///
/// Run with `RUST_LOG=info` to follow the steps.
#[tokio::main]
async fn main() -> Result<(), RidecastError> {
    env_logger::init();
    configure_polars_display();

    let config = PipelineConfig::builder().data_dir("data").build();
    let client = Ridecast::new(config).await?;

    client.download_trips(&["JC-202401", "JC-202402"]).await?;
    let series = client.hourly_series().call().await?;
    println!("{}", series.tail(Some(5)));

    let features = client.build_features(series.clone()).await?;
    println!("Feature table: {:?}", features.shape());

    let model = GradientBoostingRegressor::new(
        GradientBoostingConfig::builder()
            .n_estimators(200)
            .learning_rate(0.05)
            .build(),
    );
    let (record, report) = client.train(model).await?;
    println!(
        "Registered {} v{}: MAE {:.3}, RMSE {:.3}",
        record.name, record.version, report.metrics.mae, report.metrics.rmse
    );

    let predictions = client
        .predict::<GradientBoostingRegressor>(ModelVersion::Latest)
        .await?;
    println!("{predictions}");

    for (station, summary) in client.monitor(series).await? {
        println!("{station}: {summary:?}");
    }
    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    // show 20 rows
    env::set_var("POLARS_FMT_MAX_ROWS", "20");
}
