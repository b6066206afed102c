//! Estimators: the trained ONNX pipeline and its stand-in

mod onnx;
mod stand_in;

pub use onnx::{OnnxEstimator, DEFAULT_CLASSES};
pub use stand_in::{StandInEstimator, STAND_IN_LABEL, STAND_IN_PROBABILITIES, STAND_IN_VERSION};

use crate::error::EstimatorError;
use crate::models::{FeatureVector, Label};
use serde::Serialize;

/// Prediction capability shared by every estimator
pub trait Estimator: Send + Sync {
    /// Predict one label per row of the batch
    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<Label>, EstimatorError>;

    /// Class probabilities, one row per row of the batch
    fn predict_proba(&self, batch: &[FeatureVector]) -> Result<Vec<Vec<f32>>, EstimatorError>;

    /// Version of the underlying model
    fn version(&self) -> &str;
}

/// Which estimator variant was selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineKind {
    Onnx,
    StandIn,
}

impl PipelineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::Onnx => "onnx",
            PipelineKind::StandIn => "stand_in",
        }
    }
}

/// The estimator installed at startup. Selected once, never replaced.
pub enum Pipeline {
    Onnx(OnnxEstimator),
    StandIn(StandInEstimator),
}

impl Pipeline {
    pub fn kind(&self) -> PipelineKind {
        match self {
            Pipeline::Onnx(_) => PipelineKind::Onnx,
            Pipeline::StandIn(_) => PipelineKind::StandIn,
        }
    }
}

impl Estimator for Pipeline {
    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<Label>, EstimatorError> {
        match self {
            Pipeline::Onnx(estimator) => estimator.predict(batch),
            Pipeline::StandIn(estimator) => estimator.predict(batch),
        }
    }

    fn predict_proba(&self, batch: &[FeatureVector]) -> Result<Vec<Vec<f32>>, EstimatorError> {
        match self {
            Pipeline::Onnx(estimator) => estimator.predict_proba(batch),
            Pipeline::StandIn(estimator) => estimator.predict_proba(batch),
        }
    }

    fn version(&self) -> &str {
        match self {
            Pipeline::Onnx(estimator) => estimator.version(),
            Pipeline::StandIn(estimator) => estimator.version(),
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("kind", &self.kind())
            .field("version", &self.version())
            .finish()
    }
}
