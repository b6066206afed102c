//! App configuration

use anyhow::{Context, Result};
use classifier_lib::loader::{
    LoaderConfig, TrustPolicy, DEFAULT_MAX_MODEL_SIZE, DEFAULT_MODEL_PATH,
};
use serde::Deserialize;
use std::path::PathBuf;

/// App configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Path of the serialized pipeline
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Address the UI server binds to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port the UI server listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Expected SHA256 of the model file, hex encoded
    #[serde(default)]
    pub expected_checksum: Option<String>,

    /// Maximum model file size in bytes
    #[serde(default = "default_max_model_size")]
    pub max_model_size_bytes: u64,

    /// Operator types trusted on top of the built-in allow-list
    #[serde(default)]
    pub trusted_types: Vec<String>,
}

fn default_model_path() -> PathBuf {
    PathBuf::from(DEFAULT_MODEL_PATH)
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7860
}

fn default_max_model_size() -> u64 {
    DEFAULT_MAX_MODEL_SIZE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            host: default_host(),
            port: default_port(),
            expected_checksum: None,
            max_model_size_bytes: default_max_model_size(),
            trusted_types: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional `drug-app` file and `DRUG_APP_*` environment
    pub fn load() -> Result<Self> {
        Self::from_sources(
            config::Config::builder()
                .add_source(config::File::with_name("drug-app").required(false)),
            Self::environment(),
        )
    }

    /// `DRUG_APP_*` variables; `DRUG_APP_TRUSTED_TYPES` is comma separated
    fn environment() -> config::Environment {
        config::Environment::with_prefix("DRUG_APP")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("trusted_types")
    }

    /// Environment overrides whatever `builder` already holds
    fn from_sources(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: config::Environment,
    ) -> Result<Self> {
        let config = builder
            .add_source(environment)
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Address the UI server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Loader settings derived from this configuration
    pub fn loader_config(&self) -> LoaderConfig {
        let mut trust_policy = TrustPolicy::default();
        trust_policy.extend(self.trusted_types.iter().cloned());

        LoaderConfig {
            model_path: self.model_path.clone(),
            trust_policy,
            expected_checksum: self
                .expected_checksum
                .clone()
                .filter(|c| !c.trim().is_empty()),
            max_model_size: self.max_model_size_bytes,
        }
    }
}
