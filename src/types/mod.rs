pub mod config;
pub mod feature_group;
pub mod prediction;
pub mod series_layout;
