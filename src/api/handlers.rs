//! HTTP request handlers.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

use crate::api::types::*;
use crate::auth::ApiKeyInfo;
use crate::domain::{AuditReport, ValueSet};
use crate::engine::RunOutcome;
use crate::error::{AlignmentError, AlignmentResult};
use crate::AppState;

/// Pick the value set for a run: inline values, then a named set, then the default.
fn resolve_value_set(state: &AppState, request: &CreateRunRequest) -> AlignmentResult<ValueSet> {
    if let Some(values) = &request.values {
        return Ok(values.clone());
    }

    match &request.value_set {
        Some(name) => state.value_sets.get(name).cloned().ok_or_else(|| {
            AlignmentError::BadRequest(format!("Unknown value set '{}'", name))
        }),
        None => Ok(state.value_sets.default_set().clone()),
    }
}

/// Run a prompt through the alignment pipeline.
///
/// POST /v1/runs
#[utoipa::path(
    post,
    path = "/v1/runs",
    request_body = CreateRunRequest,
    responses(
        (status = 200, description = "Run complete, audit dispatched", body = CreateRunResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 502, description = "Completion provider failed"),
        (status = 504, description = "Completion provider timed out")
    ),
    security(("api_key" = [])),
    tag = "runs"
)]
pub async fn create_run(
    State(state): State<AppState>,
    caller: Option<Extension<ApiKeyInfo>>,
    Json(request): Json<CreateRunRequest>,
) -> AlignmentResult<Json<CreateRunResponse>> {
    if request.prompt.trim().is_empty() {
        return Err(AlignmentError::BadRequest("Prompt must not be empty".to_string()));
    }

    let value_set = resolve_value_set(&state, &request)?;

    tracing::info!(
        caller = caller.as_ref().map(|c| c.caller.as_str()).unwrap_or("anonymous"),
        value_set = %value_set.name,
        inline = request.values.is_some(),
        "Run requested"
    );

    // The audit task is detached; its result is read back through the audit endpoint.
    let RunOutcome {
        run_id,
        final_output,
        will_decision,
        ..
    } = state.pipeline.run(&request.prompt, &value_set).await?;

    Ok(Json(CreateRunResponse {
        run_id,
        final_output,
        will_decision,
    }))
}

/// Get the audit state of a run.
///
/// GET /v1/runs/{id}/audit
#[utoipa::path(
    get,
    path = "/v1/runs/{id}/audit",
    params(
        ("id" = Uuid, Path, description = "Run ID")
    ),
    responses(
        (status = 200, description = "Audit state", body = AuditReport),
        (status = 401, description = "Missing or invalid API key"),
        (status = 404, description = "Run not found")
    ),
    security(("api_key" = [])),
    tag = "runs"
)]
pub async fn get_run_audit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AlignmentResult<Json<AuditReport>> {
    let report = state.pipeline.audit_report(id).await?;
    Ok(Json(report))
}

/// List configured value sets.
///
/// GET /v1/value-sets
#[utoipa::path(
    get,
    path = "/v1/value-sets",
    responses(
        (status = 200, description = "Configured value sets", body = ListValueSetsResponse)
    ),
    tag = "value-sets"
)]
pub async fn list_value_sets(State(state): State<AppState>) -> Json<ListValueSetsResponse> {
    let default = state.value_sets.default_name().to_string();
    let value_sets = state
        .value_sets
        .all()
        .iter()
        .map(|set| ValueSetSummary {
            name: set.name.clone(),
            values: set.definition.clone(),
            is_default: set.name == default,
        })
        .collect();

    Json(ListValueSetsResponse {
        value_sets,
        default,
    })
}

/// Health check endpoint.
///
/// GET /v1/health
#[utoipa::path(
    get,
    path = "/v1/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ledger: state.pipeline.ledger().describe(),
        tracked_runs: state.pipeline.tracker().len().await,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
