//! Authentication middleware for axum.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::auth::ApiKeyValidator;
use crate::error::AlignmentError;

/// Extract and validate API key from request.
///
/// Looks for `X-API-Key` header or `Authorization: Bearer <key>` header.
pub async fn require_api_key(
    State(validator): State<ApiKeyValidator>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AlignmentError> {
    // Try X-API-Key header first
    let api_key = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    // Fall back to Authorization: Bearer
    let api_key = api_key.or_else(|| {
        request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(String::from)
    });

    let api_key =
        api_key.ok_or_else(|| AlignmentError::Unauthorized("Missing API key".to_string()))?;

    let key_info = validator.validate(&api_key).await.ok_or_else(|| {
        let prefix: String = api_key.chars().take(8).collect();
        tracing::warn!(key_prefix = %prefix, "Invalid API key attempted");
        AlignmentError::Unauthorized("Invalid API key".to_string())
    })?;

    tracing::debug!(key_id = %key_info.key_id, caller = %key_info.caller, "API key accepted");

    // Handlers read the caller from extensions
    request.extensions_mut().insert(key_info);

    Ok(next.run(request).await)
}
