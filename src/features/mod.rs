pub mod builder;
pub mod calendar;
pub mod error;
pub(crate) mod timestamps;
