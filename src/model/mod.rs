pub mod error;
pub mod feature_matrix;
pub mod gradient_boosting;
pub mod metrics;
pub mod registry;
pub mod regressor;
mod tree;
pub mod training;
