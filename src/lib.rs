//! Catchment Cache Library
//!
//! A read-through cache in front of a hydrological data provider. Catchment
//! listings, station lists and station time series are cached under
//! namespaced keys with a time-to-live, and per-catchment aggregates of
//! upcoming forecast values are rebuilt proactively when they expire.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
