//! Health check infrastructure for the predictor app
//!
//! Tracks the loaded pipeline and the UI server so that liveness and
//! readiness checks can tell a stand-in deployment from a real one.

use crate::estimator::PipelineKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still serving, e.g. on the stand-in pipeline
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    /// Healthy or degraded: the app still answers predictions
    pub fn is_operational(&self) -> bool {
        !matches!(self, ComponentStatus::Unhealthy)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Unix seconds of the last status change
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    fn with_status(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn healthy() -> Self {
        Self::with_status(ComponentStatus::Healthy, None)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Degraded, Some(message.into()))
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::with_status(ComponentStatus::Unhealthy, Some(message.into()))
    }
}

/// Body of `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status across components; no components counts as healthy
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|health| health.status)
            .max_by_key(|status| match status {
                ComponentStatus::Healthy => 0,
                ComponentStatus::Degraded => 1,
                ComponentStatus::Unhealthy => 2,
            })
            .unwrap_or(ComponentStatus::Healthy)
    }
}

/// Body of `/readyz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    pub const PIPELINE: &str = "pipeline";
    pub const UI_SERVER: &str = "ui_server";
}

/// Health of the pipeline and the UI server, plus the startup readiness flag
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    /// Record which pipeline variant was installed at startup
    pub async fn record_pipeline(&self, kind: PipelineKind, version: &str) {
        let health = match kind {
            PipelineKind::Onnx => ComponentHealth::healthy(),
            PipelineKind::StandIn => ComponentHealth::degraded(format!(
                "Stand-in pipeline active ({}): model file not found",
                version
            )),
        };
        self.update(components::PIPELINE, health).await;
    }

    /// The UI server bound its listener
    pub async fn record_server_listening(&self, addr: &str) {
        let mut health = ComponentHealth::healthy();
        health.message = Some(format!("Listening on {}", addr));
        self.update(components::UI_SERVER, health).await;
    }

    /// The UI server could not bind or stopped with an error
    pub async fn record_server_failure(&self, error: impl std::fmt::Display) {
        self.update(
            components::UI_SERVER,
            ComponentHealth::unhealthy(format!("UI server failed: {}", error)),
        )
        .await;
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        *self.ready.write().await = ready;
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Get readiness response
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;

        if !ready {
            return ReadinessResponse {
                ready: false,
                reason: Some("Pipeline not yet loaded".to_string()),
            };
        }

        // A stand-in pipeline is degraded but still serves predictions
        if !self.health().await.status.is_operational() {
            return ReadinessResponse {
                ready: false,
                reason: Some("Critical component unhealthy".to_string()),
            };
        }

        ReadinessResponse {
            ready: true,
            reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn started_registry() -> HealthRegistry {
        let registry = HealthRegistry::new();
        registry.register(components::PIPELINE).await;
        registry.register(components::UI_SERVER).await;
        registry
    }

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_registered_components_start_healthy() {
        let registry = started_registry().await;

        let health = registry.health().await;
        assert_eq!(health.components.len(), 2);
        assert_eq!(
            health.components[components::PIPELINE].status,
            ComponentStatus::Healthy
        );
        assert!(health.components[components::UI_SERVER].message.is_none());
    }

    #[tokio::test]
    async fn test_record_pipeline() {
        let registry = started_registry().await;

        registry.record_pipeline(PipelineKind::StandIn, "stand-in").await;
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert!(health.status.is_operational());
        assert_eq!(
            health.components[components::PIPELINE].message.as_deref(),
            Some("Stand-in pipeline active (stand-in): model file not found")
        );

        registry.record_pipeline(PipelineKind::Onnx, "v3").await;
        assert_eq!(registry.health().await.status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_server_listening_recorded() {
        let registry = started_registry().await;
        registry.record_server_listening("127.0.0.1:7860").await;

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Healthy);
        assert_eq!(
            health.components[components::UI_SERVER].message.as_deref(),
            Some("Listening on 127.0.0.1:7860")
        );
    }

    #[tokio::test]
    async fn test_server_failure_is_unhealthy() {
        let registry = started_registry().await;
        registry.record_pipeline(PipelineKind::StandIn, "stand-in").await;
        registry.record_server_failure("address in use").await;

        // Unhealthy outranks degraded
        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Unhealthy);
        assert!(!health.status.is_operational());
        assert_eq!(
            health.components[components::UI_SERVER].message.as_deref(),
            Some("UI server failed: address in use")
        );
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Pipeline not yet loaded"));
    }

    #[tokio::test]
    async fn test_readiness_ready_with_stand_in() {
        let registry = started_registry().await;
        registry.record_pipeline(PipelineKind::StandIn, "stand-in").await;
        registry.set_ready(true).await;

        let readiness = registry.readiness().await;
        assert!(readiness.ready);
        assert!(readiness.reason.is_none());
    }

    #[tokio::test]
    async fn test_readiness_lost_when_server_fails() {
        let registry = started_registry().await;
        registry.set_ready(true).await;
        registry.record_server_failure("listener closed").await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(
            readiness.reason.as_deref(),
            Some("Critical component unhealthy")
        );
    }
}
