//! HTTP API: form UI, JSON prediction endpoints, health checks and Prometheus metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use classifier_lib::{
    adapter::{OutcomeStatus, PredictionAdapter, PredictionOutcome},
    health::HealthRegistry,
    models::{Label, PatientInput},
    observability::{AppMetrics, StructuredLogger},
    ui::{self, Interface},
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub adapter: PredictionAdapter,
    pub interface: Arc<Interface>,
    pub health_registry: HealthRegistry,
    pub metrics: AppMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        adapter: PredictionAdapter,
        health_registry: HealthRegistry,
        metrics: AppMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            adapter,
            interface: Arc::new(ui::default_interface()),
            health_registry,
            metrics,
            logger,
        }
    }

    /// Run an adapter call off the async executor, then record its outcome.
    ///
    /// `describe` renders the success value the way the result string shows it.
    async fn run_adapter<T, F>(
        &self,
        input: PatientInput,
        channel: &str,
        call: F,
        describe: fn(&T) -> String,
    ) -> Result<T, PredictionOutcome>
    where
        T: Send + 'static,
        F: FnOnce(&PredictionAdapter, &PatientInput) -> Result<T, PredictionOutcome>
            + Send
            + 'static,
    {
        let start = Instant::now();
        let adapter = self.adapter.clone();

        let result = tokio::task::spawn_blocking(move || call(&adapter, &input))
            .await
            .unwrap_or_else(|e| Err(PredictionOutcome::Failed(e.to_string())));

        let elapsed = start.elapsed();
        let (status, text) = match &result {
            Ok(value) => (OutcomeStatus::Predicted, describe(value)),
            Err(outcome) => (outcome.status(), outcome.to_string()),
        };
        self.metrics
            .observe_prediction(status, elapsed.as_secs_f64());
        self.logger
            .log_prediction(channel, status, &text, elapsed.as_secs_f64() * 1000.0);

        result
    }

    async fn predict(&self, input: PatientInput, channel: &str) -> PredictionOutcome {
        self.run_adapter(
            input,
            channel,
            |adapter, input| match adapter.predict_drug(input) {
                PredictionOutcome::Predicted(label) => Ok(label),
                other => Err(other),
            },
            |label: &Label| PredictionOutcome::Predicted(label.clone()).to_string(),
        )
        .await
        .map_or_else(|outcome| outcome, PredictionOutcome::Predicted)
    }

    async fn predict_proba(
        &self,
        input: PatientInput,
        channel: &str,
    ) -> Result<Vec<f32>, PredictionOutcome> {
        self.run_adapter(
            input,
            channel,
            |adapter, input| adapter.class_probabilities(input),
            |probabilities: &Vec<f32>| format_probabilities(probabilities),
        )
        .await
    }
}

/// Result text for a probability row, e.g. `Class probabilities: 0.100, 0.600`
pub fn format_probabilities(probabilities: &[f32]) -> String {
    let values: Vec<String> = probabilities.iter().map(|p| format!("{:.3}", p)).collect();
    format!("Class probabilities: {}", values.join(", "))
}

/// JSON body returned by the prediction endpoints
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub status: OutcomeStatus,
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
}

impl From<PredictionOutcome> for PredictionResponse {
    fn from(outcome: PredictionOutcome) -> Self {
        Self {
            status: outcome.status(),
            result: outcome.to_string(),
            label: outcome.label().cloned(),
        }
    }
}

/// JSON body returned by the probability endpoint
#[derive(Debug, Serialize)]
pub struct ProbabilityResponse {
    pub status: OutcomeStatus,
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<f32>>,
}

/// Empty form page
async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(ui::render_page(&state.interface, None, None))
}

/// Form submission: the result is rendered into the same page
async fn predict_form(
    State(state): State<Arc<AppState>>,
    Form(input): Form<PatientInput>,
) -> Html<String> {
    let outcome = state.predict(input.clone(), "form").await;
    let result = outcome.to_string();
    Html(ui::render_page(&state.interface, Some(&input), Some(&result)))
}

/// JSON prediction; always 200 with the uniform result string
async fn predict_json(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PatientInput>,
) -> Json<PredictionResponse> {
    Json(state.predict(input, "api").await.into())
}

async fn predict_proba_json(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PatientInput>,
) -> Json<ProbabilityResponse> {
    let response = match state.predict_proba(input, "api_proba").await {
        Ok(probabilities) => ProbabilityResponse {
            status: OutcomeStatus::Predicted,
            result: format_probabilities(&probabilities),
            probabilities: Some(probabilities),
        },
        Err(outcome) => ProbabilityResponse {
            status: outcome.status(),
            result: outcome.to_string(),
            probabilities: None,
        },
    };
    Json(response)
}

/// Interface declaration (controls, examples, texts)
async fn interface(State(state): State<Arc<AppState>>) -> Json<Interface> {
    Json(state.interface.as_ref().clone())
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    // Degraded (stand-in) still serves the UI
    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/predict", post(predict_form))
        .route("/api/predict", post(predict_json))
        .route("/api/predict_proba", post(predict_proba_json))
        .route("/api/interface", get(interface))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the UI server, stopping when `shutdown` resolves.
///
/// Bind and serve failures mark the UI server component unhealthy.
pub async fn serve<F>(addr: &str, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let health_registry = state.health_registry.clone();
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(addr = %addr, error = %e, "Failed to bind UI server");
            health_registry.record_server_failure(&e).await;
            return Err(anyhow::Error::new(e).context(format!("Failed to bind {}", addr)));
        }
    };

    let local_addr = listener
        .local_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| addr.to_string());
    health_registry.record_server_listening(&local_addr).await;

    info!(addr = %local_addr, "Starting UI server");
    info!("Open http://{} in your browser", local_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
    {
        error!(error = %e, "UI server stopped with an error");
        health_registry.record_server_failure(&e).await;
        return Err(e.into());
    }

    Ok(())
}
