//! ONNX inference using tract
//!
//! Runs the trained drug classification pipeline exported to ONNX. Input 0
//! takes the encoded feature vector as `f32[1, 5]`; output 0 carries the
//! label (class indices, strings, or a score matrix) and the first rank-2
//! `f32` output carries class probabilities.

use super::Estimator;
use crate::error::{EstimatorError, LoadError};
use crate::models::{FeatureVector, Label, NUM_FEATURES};
use std::time::Instant;
use tract_onnx::pb::ModelProto;
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// Class names used when the artifact carries no `classes` metadata
pub const DEFAULT_CLASSES: &[&str] = &["DrugA", "DrugB", "DrugC", "DrugX", "DrugY"];

/// Maximum inference latency before warning
const MAX_INFERENCE_MS: u128 = 50;

const CLASSES_METADATA_KEY: &str = "classes";
const VERSION_METADATA_KEY: &str = "version";

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-backed estimator
pub struct OnnxEstimator {
    model: TractModel,
    classes: Vec<Label>,
    version: String,
}

impl OnnxEstimator {
    /// Build a runnable estimator from a parsed (and already trusted) model
    pub fn from_proto(proto: &ModelProto) -> Result<Self, LoadError> {
        let model = tract_onnx::onnx()
            .model_for_proto_model(proto)
            .map_err(|e| LoadError::Malformed(format!("{e:#}")))?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .map_err(|e| LoadError::Unsupported(format!("failed to set input shape: {e:#}")))?
            .into_optimized()
            .map_err(|e| LoadError::Unsupported(format!("failed to optimize model: {e:#}")))?
            .into_runnable()
            .map_err(|e| LoadError::Unsupported(format!("failed to create runnable model: {e:#}")))?;

        let classes = metadata_value(proto, CLASSES_METADATA_KEY)
            .map(|raw| parse_classes(&raw))
            .filter(|classes| !classes.is_empty())
            .unwrap_or_else(|| DEFAULT_CLASSES.iter().map(|c| Label::new(*c)).collect());

        let version = metadata_value(proto, VERSION_METADATA_KEY)
            .unwrap_or_else(|| format!("v{}", proto.model_version));

        Ok(Self {
            model,
            classes,
            version,
        })
    }

    /// Convert feature vector to tensor input
    fn features_to_tensor(features: &FeatureVector) -> Result<Tensor, EstimatorError> {
        Tensor::from_shape::<f32>(&[1, NUM_FEATURES], &features.to_encoded())
            .map_err(EstimatorError::inference)
    }

    /// Run the model on a single row
    fn run(&self, features: &FeatureVector) -> Result<TVec<TValue>, EstimatorError> {
        let start = Instant::now();
        let input = Self::features_to_tensor(features)?;

        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| EstimatorError::inference(format!("{e:#}")))?;

        let elapsed = start.elapsed();
        if elapsed.as_millis() > MAX_INFERENCE_MS {
            warn!(elapsed_ms = elapsed.as_millis(), "Inference exceeded {}ms target", MAX_INFERENCE_MS);
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(outputs)
    }

    fn class_at(&self, index: i64) -> Result<Label, EstimatorError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.classes.get(i))
            .cloned()
            .ok_or_else(|| {
                EstimatorError::invalid_output(format!(
                    "class index {} out of range for {} classes",
                    index,
                    self.classes.len()
                ))
            })
    }

    /// Interpret the label output tensor
    fn labels_from_output(&self, output: &Tensor) -> Result<Vec<Label>, EstimatorError> {
        match output.datum_type() {
            DatumType::I64 => output
                .as_slice::<i64>()
                .map_err(EstimatorError::inference)?
                .iter()
                .map(|&i| self.class_at(i))
                .collect(),
            DatumType::I32 => output
                .as_slice::<i32>()
                .map_err(EstimatorError::inference)?
                .iter()
                .map(|&i| self.class_at(i as i64))
                .collect(),
            DatumType::String => Ok(output
                .as_slice::<String>()
                .map_err(EstimatorError::inference)?
                .iter()
                .map(Label::new)
                .collect()),
            DatumType::F32 => score_rows(output)?
                .iter()
                .filter_map(|row| argmax(row))
                .map(|i| self.class_at(i as i64))
                .collect(),
            other => Err(EstimatorError::invalid_output(format!(
                "unsupported label output type {:?}",
                other
            ))),
        }
    }
}

impl Estimator for OnnxEstimator {
    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<Label>, EstimatorError> {
        let mut labels = Vec::with_capacity(batch.len());
        for features in batch {
            let outputs = self.run(features)?;
            let output = outputs
                .first()
                .ok_or_else(|| EstimatorError::invalid_output("no output from model"))?;
            labels.extend(self.labels_from_output(output)?);
        }
        Ok(labels)
    }

    fn predict_proba(&self, batch: &[FeatureVector]) -> Result<Vec<Vec<f32>>, EstimatorError> {
        let mut probabilities = Vec::with_capacity(batch.len());
        for features in batch {
            let outputs = self.run(features)?;
            let output = outputs
                .iter()
                .find(|t| t.datum_type() == DatumType::F32 && t.rank() == 2)
                .ok_or_else(|| {
                    EstimatorError::invalid_output("model exposes no probability output")
                })?;
            probabilities.extend(score_rows(output)?);
        }
        Ok(probabilities)
    }

    fn version(&self) -> &str {
        &self.version
    }
}

/// Split an f32 output into rows; rank 1 is a single row
fn score_rows(output: &Tensor) -> Result<Vec<Vec<f32>>, EstimatorError> {
    let values = output.as_slice::<f32>().map_err(EstimatorError::inference)?;
    match output.shape() {
        [] | [_] => Ok(if values.is_empty() {
            Vec::new()
        } else {
            vec![values.to_vec()]
        }),
        [_, 0] => Ok(Vec::new()),
        [_, cols] => Ok(values.chunks(*cols).map(<[f32]>::to_vec).collect()),
        shape => Err(EstimatorError::invalid_output(format!(
            "unexpected score shape {:?}",
            shape
        ))),
    }
}

fn argmax(row: &[f32]) -> Option<usize> {
    row.iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

fn metadata_value(proto: &ModelProto, key: &str) -> Option<String> {
    proto
        .metadata_props
        .iter()
        .find(|entry| entry.key == key)
        .map(|entry| entry.value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_classes(raw: &str) -> Vec<Label> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(Label::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BloodPressure, Cholesterol, Sex};
    use crate::test_models::argmax_classifier;

    #[test]
    fn test_argmax_picks_first_maximum() {
        assert_eq!(argmax(&[0.1, 0.6, 0.6, 0.2]), Some(1));
        assert_eq!(argmax(&[3.0]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_parse_classes_trims_entries() {
        let classes = parse_classes(" drugA, drugB ,,DrugY ");
        let names: Vec<_> = classes.iter().map(Label::as_str).collect();
        assert_eq!(names, vec!["drugA", "drugB", "DrugY"]);
    }

    #[test]
    fn test_default_classes_and_version() {
        let estimator = OnnxEstimator::from_proto(&argmax_classifier(None)).unwrap();
        assert_eq!(estimator.classes.len(), DEFAULT_CLASSES.len());
        assert_eq!(estimator.version(), "v1");
    }

    #[test]
    fn test_predict_maps_index_to_class() {
        let estimator = OnnxEstimator::from_proto(&argmax_classifier(None)).unwrap();

        // Age dominates the encoded row
        let old = FeatureVector::new(47, Sex::Female, BloodPressure::Low, Cholesterol::High, 14.2);
        assert_eq!(estimator.predict(&[old]).unwrap(), vec![Label::new("DrugA")]);

        // Na/K ratio dominates
        let young = FeatureVector::new(22, Sex::Female, BloodPressure::Normal, Cholesterol::Normal, 28.1);
        assert_eq!(estimator.predict(&[young]).unwrap(), vec![Label::new("DrugY")]);
    }

    #[test]
    fn test_classes_from_metadata() {
        let proto = argmax_classifier(Some("a,b,c,x,y"));
        let estimator = OnnxEstimator::from_proto(&proto).unwrap();

        let row = FeatureVector::new(22, Sex::Male, BloodPressure::High, Cholesterol::High, 30.0);
        assert_eq!(estimator.predict(&[row]).unwrap(), vec![Label::new("y")]);
    }

    #[test]
    fn test_predict_proba_returns_softmax_row() {
        let estimator = OnnxEstimator::from_proto(&argmax_classifier(None)).unwrap();
        let row = FeatureVector::new(50, Sex::Male, BloodPressure::High, Cholesterol::High, 34.0);

        let probabilities = estimator.predict_proba(&[row]).unwrap();
        assert_eq!(probabilities.len(), 1);
        assert_eq!(probabilities[0].len(), NUM_FEATURES);
        assert!((probabilities[0].iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert_eq!(argmax(&probabilities[0]), Some(0));
    }

    #[test]
    fn test_out_of_range_class_index_is_invalid_output() {
        let proto = argmax_classifier(Some("only,two"));
        let estimator = OnnxEstimator::from_proto(&proto).unwrap();
        let row = FeatureVector::new(15, Sex::Female, BloodPressure::Low, Cholesterol::High, 38.2);

        let err = estimator.predict(&[row]).unwrap_err();
        assert!(matches!(err, EstimatorError::InvalidOutput(_)));
    }
}
