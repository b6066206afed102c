//! Library for the drug classification predictor
//!
//! This crate provides the core functionality for:
//! - Loading the trained pipeline under an explicit trust policy
//! - Adapting raw UI submissions into predictions
//! - Declaring and rendering the form UI
//! - Health checks and observability

pub mod adapter;
pub mod error;
pub mod estimator;
pub mod health;
pub mod loader;
pub mod models;
pub mod observability;
pub mod ui;

#[cfg(test)]
mod test_models;

pub use adapter::{OutcomeStatus, PredictionAdapter, PredictionOutcome};
pub use error::{EstimatorError, InputError, LoadError};
pub use estimator::{Estimator, Pipeline, PipelineKind};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use loader::{load_pipeline, LoaderConfig, TrustPolicy};
pub use models::*;
pub use observability::{AppMetrics, StructuredLogger};
