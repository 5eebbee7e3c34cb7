//! Route definitions for the API.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers;
use crate::auth::{require_api_key, ApiKeyValidator};
use crate::AppState;

/// Security scheme modifier for OpenAPI.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::create_run,
        handlers::get_run_audit,
        handlers::list_value_sets,
        handlers::health_check,
    ),
    components(schemas(
        crate::api::types::CreateRunRequest,
        crate::api::types::CreateRunResponse,
        crate::api::types::ValueSetSummary,
        crate::api::types::ListValueSetsResponse,
        crate::api::types::HealthResponse,
        crate::domain::AuditReport,
        crate::domain::AuditStatus,
        crate::domain::PipelineRun,
        crate::domain::WillDecision,
        crate::domain::Evaluation,
        crate::domain::AffirmationLevel,
        crate::domain::ValueSet,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "runs", description = "Pipeline runs and their audits"),
        (name = "value-sets", description = "Configured value sets"),
        (name = "health", description = "Health and status endpoints")
    ),
    info(
        title = "Alignment Core API",
        version = "0.1.0",
        description = "Gates LLM answers against a value set and audits every answer it releases",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Build the API router with optional authentication.
pub fn build_router(
    state: AppState,
    auth_enabled: bool,
    api_key_validator: ApiKeyValidator,
) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let run_routes = Router::new()
        .route("/v1/runs", post(handlers::create_run))
        .route("/v1/runs/:id/audit", get(handlers::get_run_audit));

    // Routes requiring an API key when auth is on
    let run_routes = if auth_enabled {
        run_routes.layer(middleware::from_fn_with_state(
            api_key_validator,
            require_api_key,
        ))
    } else {
        run_routes
    };

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/v1/value-sets", get(handlers::list_value_sets))
        .route("/v1/health", get(handlers::health_check));

    Router::new()
        .merge(run_routes)
        .merge(public_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
