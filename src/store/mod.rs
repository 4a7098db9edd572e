pub mod error;
pub mod feature_store;
