use chrono::{Duration, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use polars::prelude::*;
use ridecast::{
    FeatureBuilder, FeatureMatrix, GradientBoostingConfig, GradientBoostingRegressor, Regressor,
    SeriesLayout,
};

/// Four weeks of hourly counts for ten stations.
fn series() -> DataFrame {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let hours = 24 * 28;
    let mut pickup_hour = Vec::new();
    let mut location_id = Vec::new();
    let mut target = Vec::new();
    for station in 0..10 {
        for h in 0..hours {
            pickup_hour.push(start + Duration::hours(h));
            location_id.push(format!("S{station}"));
            target.push(((h * 7 + station) % 13) as f64);
        }
    }
    df!(
        "pickup_hour" => pickup_hour,
        "location_id" => location_id,
        "target" => target,
    )
    .unwrap()
}

fn bench_feature_builder(c: &mut Criterion) {
    let series = series();
    let stations: Vec<String> = (0..10).map(|s| format!("S{s}")).collect();
    let layout = SeriesLayout::long();

    c.bench_function("build_features_max_lag_48", |b| {
        let builder = FeatureBuilder::default();
        b.iter(|| builder.build_combined(black_box(&series), &layout, &stations))
    });
    c.bench_function("build_features_max_lag_168", |b| {
        let builder = FeatureBuilder::builder().max_lag(168).build();
        b.iter(|| builder.build_combined(black_box(&series), &layout, &stations))
    });
}

fn bench_gradient_boosting(c: &mut Criterion) {
    let stations: Vec<String> = (0..10).map(|s| format!("S{s}")).collect();
    let features = FeatureBuilder::builder()
        .max_lag(24)
        .build()
        .build_combined(&series(), &SeriesLayout::long(), &stations)
        .unwrap();
    let matrix = FeatureMatrix::from_frame(&features).unwrap();
    let config = GradientBoostingConfig::builder().n_estimators(50).build();

    c.bench_function("gradient_boosting_fit_50_trees", |b| {
        b.iter(|| {
            let mut model = GradientBoostingRegressor::new(config);
            model.fit(black_box(&matrix)).unwrap();
            model
        })
    });
}

criterion_group!(benches, bench_feature_builder, bench_gradient_boosting);
criterion_main!(benches);
