pub mod error;
pub mod prediction_csv;
pub mod predictor;
