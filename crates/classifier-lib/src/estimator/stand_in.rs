//! Stand-in estimator used when the model artifact is missing
//!
//! Keeps the UI demonstrable without the real pipeline: every row gets the
//! same label and the same probability row, whatever its features.

use super::Estimator;
use crate::error::EstimatorError;
use crate::models::{FeatureVector, Label};
use tracing::warn;

pub const STAND_IN_LABEL: &str = "DrugY";

/// One dominant class, the remaining four share the rest
pub const STAND_IN_PROBABILITIES: [f32; 5] = [0.1, 0.1, 0.6, 0.1, 0.1];

pub const STAND_IN_VERSION: &str = "stand-in";

#[derive(Debug, Clone, Default)]
pub struct StandInEstimator;

impl StandInEstimator {
    pub fn new() -> Self {
        Self
    }
}

impl Estimator for StandInEstimator {
    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<Label>, EstimatorError> {
        warn!(
            rows = batch.len(),
            batch = ?batch.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Using stand-in pipeline for predict"
        );
        Ok(vec![Label::new(STAND_IN_LABEL); batch.len()])
    }

    fn predict_proba(&self, batch: &[FeatureVector]) -> Result<Vec<Vec<f32>>, EstimatorError> {
        warn!(
            rows = batch.len(),
            batch = ?batch.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Using stand-in pipeline for predict_proba"
        );
        Ok(vec![STAND_IN_PROBABILITIES.to_vec(); batch.len()])
    }

    fn version(&self) -> &str {
        STAND_IN_VERSION
    }
}
