use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use certguard_common::types::ValidationError;
use certguard_storage::StorageError;
use serde::Serialize;

/// Error body shared by every endpoint.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub fn error_response(status: StatusCode, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiError {
            error: msg.to_string(),
            code: code.to_string(),
        }),
    )
        .into_response()
}

pub fn message_response(msg: &str) -> Response {
    Json(MessageResponse {
        message: msg.to_string(),
    })
    .into_response()
}

pub fn validation_error_response(e: &ValidationError) -> Response {
    error_response(StatusCode::BAD_REQUEST, "invalid_request", &e.to_string())
}

pub fn bad_body_response(rejection: &JsonRejection) -> Response {
    error_response(StatusCode::BAD_REQUEST, "invalid_body", &rejection.body_text())
}

/// Maps a storage error onto its HTTP status. Only `NotFound`, `Duplicate`
/// and `Conflict` are client-visible conditions.
pub fn storage_error_response(e: &StorageError) -> Response {
    match e {
        StorageError::NotFound { .. } => {
            error_response(StatusCode::NOT_FOUND, "not_found", &e.to_string())
        }
        StorageError::Duplicate { .. } => {
            error_response(StatusCode::CONFLICT, "duplicate", &e.to_string())
        }
        StorageError::Conflict { .. } => {
            error_response(StatusCode::CONFLICT, "conflict", &e.to_string())
        }
        _ => {
            tracing::error!(error = %e, "Storage failure");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "Storage error",
            )
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    domains: usize,
}

// GET /health
async fn health(State(state): State<AppState>) -> Response {
    match state.store.list_domains().await {
        Ok(domains) => Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            domains: domains.len(),
        })
        .into_response(),
        Err(e) => storage_error_response(&e),
    }
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
