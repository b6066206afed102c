//! Pipeline loading with an explicit trust policy
//!
//! The artifact is loaded once at startup:
//! - a missing file installs the stand-in estimator
//! - size and checksum are validated before parsing
//! - every operator type the graph declares must be on the allow-list
//!   before tract is allowed to build anything from it
//!
//! Any failure other than a missing file is returned to the caller, which is
//! expected to abort startup.

use crate::error::LoadError;
use crate::estimator::{OnnxEstimator, Pipeline, StandInEstimator};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tract_onnx::pb::{GraphProto, ModelProto};
use tract_onnx::prelude::*;
use tracing::{error, info, warn};

/// Default artifact location, relative to the working directory
pub const DEFAULT_MODEL_PATH: &str = "Model/drug_pipeline.onnx";

/// Default maximum artifact size (64MB)
pub const DEFAULT_MAX_MODEL_SIZE: u64 = 64 * 1024 * 1024;

/// Domain used for nodes that leave it empty
pub const DEFAULT_DOMAIN: &str = "ai.onnx";

/// Operator types trusted out of the box
pub const DEFAULT_TRUSTED_TYPES: &[&str] = &[
    // Arithmetic
    "ai.onnx.Abs",
    "ai.onnx.Add",
    "ai.onnx.Clip",
    "ai.onnx.Div",
    "ai.onnx.Exp",
    "ai.onnx.Gemm",
    "ai.onnx.Log",
    "ai.onnx.MatMul",
    "ai.onnx.Mul",
    "ai.onnx.Neg",
    "ai.onnx.Sqrt",
    "ai.onnx.Sub",
    // Activations
    "ai.onnx.Relu",
    "ai.onnx.Sigmoid",
    "ai.onnx.Softmax",
    "ai.onnx.Tanh",
    // Comparison and logic
    "ai.onnx.And",
    "ai.onnx.Equal",
    "ai.onnx.Greater",
    "ai.onnx.Less",
    "ai.onnx.Not",
    "ai.onnx.Or",
    "ai.onnx.Where",
    // Reductions
    "ai.onnx.ArgMax",
    "ai.onnx.ArgMin",
    "ai.onnx.ReduceMax",
    "ai.onnx.ReduceMean",
    "ai.onnx.ReduceSum",
    // Shape and data movement
    "ai.onnx.Cast",
    "ai.onnx.Concat",
    "ai.onnx.Constant",
    "ai.onnx.ConstantOfShape",
    "ai.onnx.Flatten",
    "ai.onnx.Gather",
    "ai.onnx.Identity",
    "ai.onnx.OneHot",
    "ai.onnx.Reshape",
    "ai.onnx.Shape",
    "ai.onnx.Slice",
    "ai.onnx.Squeeze",
    "ai.onnx.Transpose",
    "ai.onnx.Unsqueeze",
    // Classical ML
    "ai.onnx.ml.Binarizer",
    "ai.onnx.ml.CategoryMapper",
    "ai.onnx.ml.Imputer",
    "ai.onnx.ml.LabelEncoder",
    "ai.onnx.ml.LinearClassifier",
    "ai.onnx.ml.Normalizer",
    "ai.onnx.ml.OneHotEncoder",
    "ai.onnx.ml.Scaler",
    "ai.onnx.ml.TreeEnsembleClassifier",
];

/// Allow-list of operator types an artifact may declare
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPolicy {
    trusted: BTreeSet<String>,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self::with_trusted(DEFAULT_TRUSTED_TYPES.iter().copied())
    }
}

impl TrustPolicy {
    /// Policy trusting nothing
    pub fn empty() -> Self {
        Self {
            trusted: BTreeSet::new(),
        }
    }

    pub fn with_trusted<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut policy = Self::empty();
        policy.extend(types);
        policy
    }

    /// Add types to the allow-list
    pub fn extend<I, S>(&mut self, types: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted.extend(
            types
                .into_iter()
                .map(Into::into)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        );
    }

    pub fn is_trusted(&self, type_name: &str) -> bool {
        self.trusted.contains(type_name)
    }

    pub fn len(&self) -> usize {
        self.trusted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trusted.is_empty()
    }

    /// Declared types not on the allow-list, sorted
    pub fn untrusted(&self, declared: &BTreeSet<String>) -> Vec<String> {
        declared
            .iter()
            .filter(|t| !self.is_trusted(t))
            .cloned()
            .collect()
    }

    /// Accept the declared set or fail with every untrusted type
    pub fn check(&self, declared: &BTreeSet<String>) -> Result<(), LoadError> {
        let untrusted = self.untrusted(declared);
        if untrusted.is_empty() {
            Ok(())
        } else {
            Err(LoadError::UntrustedTypes(untrusted))
        }
    }
}

/// Configuration for pipeline loading
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Path of the serialized pipeline
    pub model_path: PathBuf,
    /// Allow-list applied to the declared operator types
    pub trust_policy: TrustPolicy,
    /// Expected SHA256 of the artifact, hex encoded
    pub expected_checksum: Option<String>,
    /// Maximum artifact size in bytes
    pub max_model_size: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            trust_policy: TrustPolicy::default(),
            expected_checksum: None,
            max_model_size: DEFAULT_MAX_MODEL_SIZE,
        }
    }
}

/// Load the pipeline, falling back to the stand-in when the file is absent
pub fn load_pipeline(config: &LoaderConfig) -> Result<Pipeline, LoadError> {
    let path = config.model_path.as_path();

    let bytes = match read_artifact(path, config.max_model_size) {
        Ok(bytes) => bytes,
        Err(LoadError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
            error!(
                path = %path.display(),
                "Model file not found"
            );
            error!(
                path = %path.display(),
                "Ensure the model file exists relative to the working directory"
            );
            warn!("Using a stand-in pipeline because the model file was not found");
            return Ok(Pipeline::StandIn(StandInEstimator::new()));
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "An error occurred while loading the pipeline");
            return Err(e);
        }
    };

    load_from_bytes(&bytes, config).map_err(|e| {
        error!(path = %path.display(), error = %e, "An error occurred while loading the pipeline");
        e
    })
}

/// Validate and build a pipeline from artifact bytes
pub fn load_from_bytes(bytes: &[u8], config: &LoaderConfig) -> Result<Pipeline, LoadError> {
    let checksum = compute_checksum(bytes);
    if let Some(expected) = &config.expected_checksum {
        if !expected.trim().eq_ignore_ascii_case(&checksum) {
            return Err(LoadError::ChecksumMismatch {
                expected: expected.trim().to_lowercase(),
                actual: checksum,
            });
        }
        info!(checksum = %checksum, "Model checksum validated");
    }

    let proto = parse_model(bytes)?;
    let pipeline = build_pipeline(&proto, &config.trust_policy)?;

    info!(
        size = bytes.len(),
        checksum = %checksum,
        "Model artifact loaded"
    );

    Ok(pipeline)
}

/// Apply the trust policy, then hand the model to tract
pub fn build_pipeline(proto: &ModelProto, policy: &TrustPolicy) -> Result<Pipeline, LoadError> {
    if proto.graph.is_none() {
        return Err(LoadError::Unsupported("model has no graph".to_string()));
    }

    if policy.is_empty() {
        warn!("Trust policy is empty, every declared type will be rejected");
    }

    let declared = declared_types(proto);
    policy.check(&declared)?;

    info!(
        declared_types = declared.len(),
        trusted_types = policy.len(),
        "Declared model types accepted by trust policy"
    );

    let estimator = OnnxEstimator::from_proto(proto)?;
    Ok(Pipeline::Onnx(estimator))
}

/// Qualified operator types used anywhere in the model, sub-graphs included
pub fn declared_types(proto: &ModelProto) -> BTreeSet<String> {
    let mut types = BTreeSet::new();
    if let Some(graph) = &proto.graph {
        collect_graph_types(graph, &mut types);
    }
    types
}

fn collect_graph_types(graph: &GraphProto, types: &mut BTreeSet<String>) {
    for node in &graph.node {
        let domain = if node.domain.is_empty() {
            DEFAULT_DOMAIN
        } else {
            node.domain.as_str()
        };
        types.insert(format!("{}.{}", domain, node.op_type));

        for attribute in &node.attribute {
            for subgraph in attribute.g.iter().chain(&attribute.graphs) {
                collect_graph_types(subgraph, types);
            }
        }
    }
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn read_artifact(path: &Path, max_size: u64) -> Result<Vec<u8>, LoadError> {
    let io_error = |source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let size = fs::metadata(path).map_err(io_error)?.len();
    if size > max_size {
        return Err(LoadError::TooLarge {
            size,
            max: max_size,
        });
    }

    fs::read(path).map_err(io_error)
}

fn parse_model(bytes: &[u8]) -> Result<ModelProto, LoadError> {
    tract_onnx::onnx()
        .proto_model_for_read(&mut std::io::Cursor::new(bytes))
        .map_err(|e| LoadError::Malformed(format!("{e:#}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{Estimator, PipelineKind};
    use crate::models::{BloodPressure, Cholesterol, FeatureVector, Sex};
    use crate::test_models::{argmax_classifier, node};
    use prost::Message;
    use tempfile::TempDir;

    fn config_for(path: PathBuf) -> LoaderConfig {
        LoaderConfig {
            model_path: path,
            ..Default::default()
        }
    }

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"test model weights");
        assert_eq!(checksum.len(), 64); // SHA256 hex is 64 chars
        assert_eq!(checksum, compute_checksum(b"test model weights"));
        assert_ne!(checksum, compute_checksum(b"other weights"));
    }

    #[test]
    fn test_missing_file_installs_stand_in() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_for(temp_dir.path().join("Model").join("drug_pipeline.onnx"));

        let pipeline = load_pipeline(&config).unwrap();
        assert_eq!(pipeline.kind(), PipelineKind::StandIn);

        let row = FeatureVector::new(47, Sex::Female, BloodPressure::Low, Cholesterol::High, 14.2);
        let labels = pipeline.predict(&[row]).unwrap();
        assert_eq!(labels[0].as_str(), "DrugY");
    }

    #[test]
    fn test_malformed_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("drug_pipeline.onnx");
        fs::write(&path, b"not an onnx model").unwrap();

        let err = load_pipeline(&config_for(path)).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Malformed(_) | LoadError::Unsupported(_)
        ));
    }

    #[test]
    fn test_unreadable_path_is_fatal() {
        // A directory cannot be read as a model file
        let temp_dir = TempDir::new().unwrap();
        let err = load_pipeline(&config_for(temp_dir.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn test_oversized_file_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("drug_pipeline.onnx");
        fs::write(&path, vec![0u8; 2048]).unwrap();

        let config = LoaderConfig {
            max_model_size: 1024,
            ..config_for(path)
        };
        let err = load_pipeline(&config).unwrap_err();
        assert!(matches!(err, LoadError::TooLarge { size: 2048, max: 1024 }));
    }

    #[test]
    fn test_checksum_mismatch_rejected_before_parsing() {
        let config = LoaderConfig {
            expected_checksum: Some("00".repeat(32)),
            ..Default::default()
        };
        let err = load_from_bytes(b"not an onnx model", &config).unwrap_err();
        assert!(matches!(err, LoadError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_declared_types_are_qualified() {
        let declared = declared_types(&argmax_classifier(None));
        let expected: BTreeSet<String> = ["ai.onnx.ArgMax", "ai.onnx.Softmax"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(declared, expected);
    }

    #[test]
    fn test_declared_types_include_subgraphs() {
        let mut proto = argmax_classifier(None);
        let mut branch = node("If", "", &["cond"], &["out"]);
        branch.attribute = vec![tract_onnx::pb::AttributeProto {
            name: "then_branch".to_string(),
            g: Some(GraphProto {
                node: vec![node("ZipMap", "ai.onnx.ml", &["x"], &["y"])],
                ..Default::default()
            }),
            ..Default::default()
        }];
        proto.graph.as_mut().unwrap().node.push(branch);

        let declared = declared_types(&proto);
        assert!(declared.contains("ai.onnx.If"));
        assert!(declared.contains("ai.onnx.ml.ZipMap"));
    }

    #[test]
    fn test_declared_types_include_repeated_graph_attributes() {
        let mut proto = argmax_classifier(None);
        let mut scan = node("Scan", "", &["state"], &["out"]);
        scan.attribute = vec![tract_onnx::pb::AttributeProto {
            name: "bodies".to_string(),
            graphs: vec![
                GraphProto {
                    node: vec![node("Erf", "", &["x"], &["y"])],
                    ..Default::default()
                },
                GraphProto {
                    node: vec![node("Custom", "com.example", &["x"], &["y"])],
                    ..Default::default()
                },
            ],
            ..Default::default()
        }];
        proto.graph.as_mut().unwrap().node.push(scan);

        let declared = declared_types(&proto);
        assert!(declared.contains("ai.onnx.Erf"));
        assert!(declared.contains("com.example.Custom"));

        let err = build_pipeline(&proto, &TrustPolicy::default()).unwrap_err();
        match err {
            LoadError::UntrustedTypes(types) => {
                assert_eq!(types, vec!["ai.onnx.Erf", "ai.onnx.Scan", "com.example.Custom"]);
            }
            other => panic!("expected untrusted types, got {other:?}"),
        }
    }

    #[test]
    fn test_untrusted_types_reported_sorted() {
        let mut proto = argmax_classifier(None);
        let graph = proto.graph.as_mut().unwrap();
        graph.node.push(node("Zeta", "com.example", &["features"], &["z"]));
        graph.node.push(node("Alpha", "com.example", &["features"], &["a"]));

        let err = build_pipeline(&proto, &TrustPolicy::default()).unwrap_err();
        match err {
            LoadError::UntrustedTypes(types) => {
                assert_eq!(types, vec!["com.example.Alpha", "com.example.Zeta"]);
            }
            other => panic!("expected untrusted types, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_policy_trusts_nothing() {
        let err = build_pipeline(&argmax_classifier(None), &TrustPolicy::empty()).unwrap_err();
        assert!(matches!(err, LoadError::UntrustedTypes(ref t) if t.len() == 2));
    }

    #[test]
    fn test_policy_extension() {
        let mut policy = TrustPolicy::empty();
        policy.extend(["ai.onnx.ArgMax", " ai.onnx.Softmax ", ""]);
        assert_eq!(policy.len(), 2);

        let pipeline = build_pipeline(&argmax_classifier(None), &policy).unwrap();
        assert_eq!(pipeline.kind(), PipelineKind::Onnx);
    }

    #[test]
    fn test_model_without_graph_rejected() {
        let proto = ModelProto::default();
        let err = build_pipeline(&proto, &TrustPolicy::default()).unwrap_err();
        assert!(matches!(err, LoadError::Unsupported(_)));
    }

    #[test]
    fn test_trusted_model_predicts() {
        let pipeline = build_pipeline(&argmax_classifier(None), &TrustPolicy::default()).unwrap();
        assert_eq!(pipeline.kind(), PipelineKind::Onnx);
        assert_eq!(pipeline.version(), "v1");

        let row = FeatureVector::new(30, Sex::Male, BloodPressure::High, Cholesterol::Normal, 15.4);
        let labels = pipeline.predict(&[row]).unwrap();
        assert_eq!(labels[0].as_str(), "DrugA");
    }

    #[test]
    fn test_artifact_on_disk_loads_with_matching_checksum() {
        let bytes = argmax_classifier(None).encode_to_vec();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("drug_pipeline.onnx");
        fs::write(&path, &bytes).unwrap();

        // Hex digests compare case-insensitively
        let config = LoaderConfig {
            expected_checksum: Some(compute_checksum(&bytes).to_uppercase()),
            ..config_for(path)
        };
        let pipeline = load_pipeline(&config).unwrap();
        assert_eq!(pipeline.kind(), PipelineKind::Onnx);
        assert_eq!(pipeline.version(), "v1");

        let row = FeatureVector::new(30, Sex::Male, BloodPressure::High, Cholesterol::Normal, 15.4);
        let labels = pipeline.predict(&[row]).unwrap();
        assert_eq!(labels[0].as_str(), "DrugA");
    }

    #[test]
    fn test_parse_model_reads_encoded_bytes() {
        let bytes = argmax_classifier(Some("a,b,c,d,e")).encode_to_vec();
        let proto = parse_model(&bytes).unwrap();

        assert_eq!(proto.model_version, 1);
        assert_eq!(proto.metadata_props[0].value, "a,b,c,d,e");
        assert_eq!(declared_types(&proto), declared_types(&argmax_classifier(None)));
    }
}
