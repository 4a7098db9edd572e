use chrono::{Duration, NaiveDate};
use polars::prelude::*;
use ridecast::{FeatureBuilder, SeriesLayout};
use std::env;

/// Builds features from a synthetic wide-layout series: one column per station.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    env::set_var("POLARS_FMT_MAX_COLS", "-1");

    let start = NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or("invalid start date")?;
    let hours: Vec<_> = (0..72).map(|h| start + Duration::hours(h)).collect();
    let series = df!(
        "pickup_hour" => hours,
        "HB102" => (0..72).map(|h| (h % 24) as f64).collect::<Vec<_>>(),
        "JC115" => (0..72).map(|h| ((h * 5) % 11) as f64).collect::<Vec<_>>(),
    )?;

    let builder = FeatureBuilder::builder().max_lag(24).build();
    let tables = builder.build(&series, &SeriesLayout::wide(), &["HB102", "JC115", "HB105"])?;
    for (station, table) in &tables {
        println!("{station}: {:?}", table.shape());
    }

    let combined = builder.concat(&tables)?;
    println!("{}", combined.head(Some(5)));
    Ok(())
}
