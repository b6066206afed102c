//! Drug Classification Predictor
//!
//! Loads the trained pipeline once at startup and serves a form UI that
//! predicts a drug category from five patient attributes.

use anyhow::{Context, Result};
use classifier_lib::{
    estimator::Estimator,
    health::{components, HealthRegistry},
    loader,
    observability::{AppMetrics, StructuredLogger},
    PredictionAdapter,
};
use drug_app::{api, config::AppConfig};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = AppConfig::load()?;
    let logger = StructuredLogger::new(config.bind_addr());
    logger.log_startup(APP_VERSION, &config.model_path);

    let health_registry = HealthRegistry::new();
    health_registry.register(components::PIPELINE).await;
    health_registry.register(components::UI_SERVER).await;

    let metrics = AppMetrics::new();

    // Any failure other than a missing file stops startup here
    let loader_config = config.loader_config();
    let start = Instant::now();
    let pipeline = loader::load_pipeline(&loader_config).with_context(|| {
        format!(
            "Failed to load pipeline from {}",
            loader_config.model_path.display()
        )
    })?;
    let load_secs = start.elapsed().as_secs_f64();

    let kind = pipeline.kind();
    let version = pipeline.version().to_string();
    metrics.set_pipeline(kind, &version, load_secs);
    logger.log_pipeline_loaded(kind, &version, &loader_config.model_path, load_secs);
    health_registry.record_pipeline(kind, &version).await;

    let adapter = PredictionAdapter::new(Arc::new(pipeline));
    let app_state = Arc::new(api::AppState::new(
        adapter,
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));

    health_registry.set_ready(true).await;

    let shutdown_logger = logger.clone();
    let shutdown = async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => shutdown_logger.log_shutdown("SIGINT received"),
            Err(e) => {
                warn!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await
            }
        }
    };

    api::serve(&config.bind_addr(), app_state, shutdown).await?;
    info!("Shutting down");

    Ok(())
}
