//! Drug classification predictor web app
//!
//! Serves the form UI, the JSON prediction API and the health/metrics
//! endpoints on top of `classifier-lib`.

pub mod api;
pub mod config;
