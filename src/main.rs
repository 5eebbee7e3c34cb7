//! Alignment Core - value-aligned answer pipeline
//!
//! This service answers prompts through a four-stage pipeline (Intellect,
//! Will, Conscience, Spirit), gating each answer against a configurable
//! value set and recording an audit of every run in an append-only ledger.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

mod api;
mod auth;
mod config;
mod domain;
mod engine;
mod error;
mod logging;
mod storage;

use crate::api::build_router;
use crate::auth::ApiKeyValidator;
use crate::config::{Config, CritiqueFormat};
use crate::domain::ValueSetLibrary;
use crate::engine::{
    AlignmentPipeline, CompletionClient, Conscience, CritiqueParser, Intellect,
    JsonCritiqueParser, LineBlockParser, OpenRouterClient, OpenRouterConfig, PipelineSettings,
    TimeoutClient, Will,
};
use crate::storage::{AuditTracker, JsonlLedger};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The alignment pipeline.
    pub pipeline: Arc<AlignmentPipeline>,
    /// Configured value sets.
    pub value_sets: Arc<ValueSetLibrary>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if present)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: No .env file loaded ({e})");
    }

    // Initialize logging
    logging::init();

    tracing::info!("Starting Alignment Core v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    let value_sets = config.value_set_library().map_err(|e| {
        tracing::error!(error = %e, "Invalid value set library");
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        model = %config.llm.model,
        value_sets = value_sets.all().len(),
        default_value_set = %value_sets.default_name(),
        auth_enabled = %config.auth.enabled,
        "Configuration loaded"
    );

    // Completion provider, bounded by the per-call timeout
    let provider = OpenRouterClient::new(OpenRouterConfig {
        url: config.llm.provider_url.clone(),
        api_key: config.llm.api_key.clone(),
        model: config.llm.model.clone(),
        timeout_secs: config.llm.timeout_secs,
    })?;
    let client: Arc<dyn CompletionClient> = Arc::new(TimeoutClient::new(
        provider,
        Duration::from_secs(config.llm.timeout_secs),
    ));

    let parser: Box<dyn CritiqueParser> = match config.pipeline.critique_format {
        CritiqueFormat::Lines => Box::new(LineBlockParser),
        CritiqueFormat::Json => Box::new(JsonCritiqueParser),
    };
    tracing::info!(parser = parser.name(), "Critique parser selected");

    // Open the audit ledger
    let ledger = JsonlLedger::open(&config.ledger.path).await.map_err(|e| {
        tracing::error!(error = %e, path = %config.ledger.path, "Failed to open ledger");
        anyhow::anyhow!("Ledger error: {}", e)
    })?;
    tracing::info!(path = %ledger.path().display(), "Ledger opened");

    let pipeline = AlignmentPipeline::new(
        Intellect::new(client.clone(), config.llm.intellect_temperature),
        Will::new(client.clone(), config.llm.will_temperature),
        Conscience::new(client, config.llm.conscience_temperature, parser),
        Arc::new(ledger),
        AuditTracker::new(config.ledger.tracker_capacity),
        PipelineSettings {
            audit_blocked_runs: config.pipeline.audit_blocked_runs,
        },
    );

    // Build authentication components
    let api_key_validator = ApiKeyValidator::new(config.auth.api_keys.clone());

    if config.auth.enabled {
        tracing::info!(
            api_keys = api_key_validator.active_count().await,
            "Authentication enabled"
        );
    } else {
        tracing::warn!("Authentication is DISABLED - enable for production");
    }

    // Build application state
    let state = AppState {
        pipeline: Arc::new(pipeline),
        value_sets: Arc::new(value_sets),
    };

    // Build router
    let app = build_router(state, config.auth.enabled, api_key_validator);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(address = %addr, "Server listening");
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
