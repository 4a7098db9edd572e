pub mod downloader;
pub mod error;
pub mod time_series;
