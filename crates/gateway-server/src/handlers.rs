//! HTTP request handlers for the gateway API.

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gateway_core::{GenerateResponse, RelayMode, RelayRequest};
use secrecy::SecretString;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};

use crate::{
    error::ApiError,
    extractors::{JsonBody, RequestId},
    state::AppState,
};

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Version
    pub version: String,
    /// Number of configured upstream keys
    pub keys: usize,
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        keys: state.keys.len(),
    })
}

/// Readiness check endpoint
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.keys.stats();

    if stats.total > 0 {
        (
            StatusCode::OK,
            Json(json!({ "status": "ready", "keys": stats })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not_ready", "keys": stats })),
        )
    }
}

/// Liveness check endpoint
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, "alive")
}

/// Relay a generation request to the upstream provider.
///
/// The body selects unary or streaming delivery through its `mode` field.
/// One key is drawn from the pool per invocation and its outcome is
/// reported back exactly once.
#[instrument(skip(state, body), fields(mode = ?body.mode))]
pub async fn relay(
    State(state): State<AppState>,
    RequestId(request_id): RequestId,
    JsonBody(body): JsonBody<RelayRequest>,
) -> Result<Response, ApiError> {
    let model = body
        .model
        .clone()
        .unwrap_or_else(|| state.config.default_model.clone());

    let key = match state.keys.acquire() {
        Ok(key) => key,
        Err(e) => {
            warn!(request_id = %request_id, error = %e, "No upstream key available");
            return Err(e.into());
        }
    };

    let upstream_body = body.upstream_body();

    match body.mode {
        RelayMode::Generate => {
            handle_generate(&state, &request_id, &key, &model, &upstream_body).await
        }
        RelayMode::Stream => handle_stream(&state, &request_id, &key, &model, &upstream_body).await,
    }
}

async fn handle_generate(
    state: &AppState,
    request_id: &str,
    key: &SecretString,
    model: &str,
    body: &Value,
) -> Result<Response, ApiError> {
    match state.client.generate(key, model, body).await {
        Ok(value) => {
            state.keys.report_success(key);
            let response = GenerateResponse::from_upstream(&value)?;

            info!(
                request_id = %request_id,
                model = %model,
                "Generate request completed"
            );

            Ok(Json(response).into_response())
        }
        Err(e) => {
            state.keys.report_failure(key);

            error!(
                request_id = %request_id,
                model = %model,
                error = %e,
                "Generate request failed"
            );

            Err(e.into())
        }
    }
}

async fn handle_stream(
    state: &AppState,
    request_id: &str,
    key: &SecretString,
    model: &str,
    body: &Value,
) -> Result<Response, ApiError> {
    match state.client.stream_generate(key, model, body).await {
        Ok(stream) => {
            // The upstream accepted the call, so the outcome is settled here.
            // Errors surfacing mid-stream abort the body without a second
            // report against the key.
            state.keys.report_success(key);

            info!(
                request_id = %request_id,
                model = %model,
                "Streaming request accepted"
            );

            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                Body::from_stream(stream),
            )
                .into_response())
        }
        Err(e) => {
            state.keys.report_failure(key);

            error!(
                request_id = %request_id,
                model = %model,
                error = %e,
                "Streaming request failed"
            );

            Err(e.into())
        }
    }
}
