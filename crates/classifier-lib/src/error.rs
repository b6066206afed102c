//! Error types for pipeline loading, inference and input conversion

use std::path::PathBuf;

/// Failure while loading the serialized pipeline. Every variant is fatal at
/// startup; a missing artifact is not an error (the stand-in is used instead).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read model file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model size {size} bytes exceeds maximum {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("model declares untrusted types: {}", .0.join(", "))]
    UntrustedTypes(Vec<String>),

    #[error("failed to parse model: {0}")]
    Malformed(String),

    #[error("model graph is not supported: {0}")]
    Unsupported(String),
}

/// Failure raised by an estimator while predicting
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimatorError {
    /// The estimator has no usable predict capability
    #[error("estimator has no usable predict capability")]
    NotLoaded,

    #[error("invalid model output: {0}")]
    InvalidOutput(String),

    #[error("{0}")]
    Inference(String),
}

impl EstimatorError {
    pub fn inference(msg: impl std::fmt::Display) -> Self {
        Self::Inference(msg.to_string())
    }

    pub fn invalid_output(msg: impl Into<String>) -> Self {
        Self::InvalidOutput(msg.into())
    }
}

/// Failure converting raw UI values into a feature vector
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InputError {
    #[error("missing value for {0}")]
    Missing(&'static str),

    #[error("invalid {field} '{value}': expected one of {choices}")]
    InvalidChoice {
        field: &'static str,
        value: String,
        choices: String,
    },

    #[error("{field} must be numeric, got '{value}'")]
    NotNumeric { field: &'static str, value: String },

    #[error("{field} must be an integer, got {value}")]
    NotInteger { field: &'static str, value: f64 },
}

impl InputError {
    pub fn invalid_choice(field: &'static str, value: &str, choices: &[&str]) -> Self {
        Self::InvalidChoice {
            field,
            value: value.to_string(),
            choices: choices.join(", "),
        }
    }

    pub fn not_numeric(field: &'static str, value: &str) -> Self {
        Self::NotNumeric {
            field,
            value: value.to_string(),
        }
    }

    pub fn not_integer(field: &'static str, value: f64) -> Self {
        Self::NotInteger { field, value }
    }
}
