//! Prediction adapter
//!
//! Turns one set of raw UI values into one display string. Nothing escapes
//! this boundary: estimator errors, invalid inputs and panics inside the
//! estimator all come back as a [`PredictionOutcome`].

use crate::error::EstimatorError;
use crate::estimator::Estimator;
use crate::models::{FeatureVector, Label, PatientInput};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

pub const EMPTY_RESULT_MESSAGE: &str = "Error: Prediction returned an empty result.";
pub const NOT_LOADED_MESSAGE: &str = "Error: Model pipeline not loaded correctly.";

/// Result of one adapter call. Every variant renders as display text.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Predicted(Label),
    EmptyResult,
    NotLoaded,
    Failed(String),
}

impl PredictionOutcome {
    pub fn label(&self) -> Option<&Label> {
        match self {
            PredictionOutcome::Predicted(label) => Some(label),
            _ => None,
        }
    }

    /// Stable tag for metrics and the JSON API
    pub fn status(&self) -> OutcomeStatus {
        match self {
            PredictionOutcome::Predicted(_) => OutcomeStatus::Predicted,
            PredictionOutcome::EmptyResult => OutcomeStatus::EmptyResult,
            PredictionOutcome::NotLoaded => OutcomeStatus::NotLoaded,
            PredictionOutcome::Failed(_) => OutcomeStatus::Failed,
        }
    }
}

impl fmt::Display for PredictionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionOutcome::Predicted(label) => write!(f, "Predicted Drug: {}", label),
            PredictionOutcome::EmptyResult => f.write_str(EMPTY_RESULT_MESSAGE),
            PredictionOutcome::NotLoaded => f.write_str(NOT_LOADED_MESSAGE),
            PredictionOutcome::Failed(message) => {
                write!(f, "Prediction Error: {}. Please check input values.", message)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Predicted,
    EmptyResult,
    NotLoaded,
    Failed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Predicted => "predicted",
            OutcomeStatus::EmptyResult => "empty_result",
            OutcomeStatus::NotLoaded => "not_loaded",
            OutcomeStatus::Failed => "failed",
        }
    }
}

/// Adapter between UI submissions and the loaded estimator
#[derive(Clone)]
pub struct PredictionAdapter {
    estimator: Option<Arc<dyn Estimator>>,
}

impl PredictionAdapter {
    pub fn new(estimator: Arc<dyn Estimator>) -> Self {
        Self {
            estimator: Some(estimator),
        }
    }

    /// Adapter with no estimator behind it
    pub fn unloaded() -> Self {
        Self { estimator: None }
    }

    pub fn is_loaded(&self) -> bool {
        self.estimator.is_some()
    }

    /// Predict the drug for one patient and format the result
    pub fn predict_drug(&self, input: &PatientInput) -> PredictionOutcome {
        match self.invoke(input, |estimator, batch| estimator.predict(batch)) {
            Ok(label) => {
                debug!(label = %label, "Prediction completed");
                PredictionOutcome::Predicted(label)
            }
            Err(outcome) => outcome,
        }
    }

    /// Class probabilities for one patient.
    ///
    /// The error side is never [`PredictionOutcome::Predicted`].
    pub fn class_probabilities(&self, input: &PatientInput) -> Result<Vec<f32>, PredictionOutcome> {
        self.invoke(input, |estimator, batch| estimator.predict_proba(batch))
    }

    /// Build the single-row batch, call the estimator and keep the first row
    fn invoke<T, F>(&self, input: &PatientInput, call: F) -> Result<T, PredictionOutcome>
    where
        F: FnOnce(&dyn Estimator, &[FeatureVector]) -> Result<Vec<T>, EstimatorError>,
    {
        let Some(estimator) = self.estimator.as_deref() else {
            warn!("Prediction requested but no pipeline is loaded");
            return Err(PredictionOutcome::NotLoaded);
        };

        let features = FeatureVector::try_from(input).map_err(|e| {
            warn!(error = %e, "Invalid prediction input");
            PredictionOutcome::Failed(e.to_string())
        })?;
        let batch = [features];

        let result = panic::catch_unwind(AssertUnwindSafe(|| call(estimator, &batch)));

        match result {
            Ok(Ok(rows)) => rows.into_iter().next().ok_or_else(|| {
                warn!("Prediction returned an empty result");
                PredictionOutcome::EmptyResult
            }),
            Ok(Err(EstimatorError::NotLoaded)) => {
                warn!("Pipeline has no usable predict capability");
                Err(PredictionOutcome::NotLoaded)
            }
            Ok(Err(e)) => {
                warn!(error = %e, "An unexpected error occurred during prediction");
                Err(PredictionOutcome::Failed(e.to_string()))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(error = %message, "Estimator panicked during prediction");
                Err(PredictionOutcome::Failed(message))
            }
        }
    }
}

impl fmt::Debug for PredictionAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredictionAdapter")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "estimator panicked".to_string()
    }
}
