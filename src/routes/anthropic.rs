use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method};
use axum::response::Json;

use crate::error::AppError;
use crate::middleware::api_auth::bearer_token;
use crate::models::GatewayRequest;
use crate::services::gateway::GatewayOutput;
use crate::state::AppState;

/// /api/anthropic: metered proxy to the provider.
///
/// Checks run in a fixed order: method, server credentials, bearer token,
/// body, then the gateway's own account, quota and provider stages.
pub async fn proxy(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<GatewayOutput>, AppError> {
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let missing = state.config.missing_credentials();
    if !missing.is_empty() {
        return Err(AppError::Misconfigured(missing));
    }

    let token = bearer_token(&headers).ok_or(AppError::Unauthorized)?;

    let req: GatewayRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?;
    if req.payload.model.trim().is_empty() {
        return Err(AppError::BadRequest("Invalid payload".into()));
    }

    let output = state
        .gateway
        .call(token, req.payload, req.log_context)
        .await?;
    Ok(Json(output))
}
