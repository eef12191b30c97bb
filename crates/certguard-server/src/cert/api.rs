use crate::api::{
    bad_body_response, error_response, message_response, storage_error_response,
    validation_error_response,
};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use certguard_common::types::{CheckDomainRequest, CreateDomainRequest, UpdateDomainRequest};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;

use super::reducer::apply_verdict;
use super::{check_and_store, CheckedDomain};

// GET /api/domains
async fn list_domains(State(state): State<AppState>) -> Response {
    match state.store.list_domains().await {
        Ok(domains) => Json(domains).into_response(),
        Err(e) => storage_error_response(&e),
    }
}

// POST /api/domains
async fn create_domain(
    State(state): State<AppState>,
    payload: Result<Json<CreateDomainRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(body) => body,
        Err(rejection) => return bad_body_response(&rejection),
    };
    let new = match req.validate() {
        Ok(new) => new,
        Err(e) => return validation_error_response(&e),
    };

    match state.store.get_domain_by_name(&new.domain_name).await {
        Ok(Some(_)) => {
            return error_response(
                StatusCode::CONFLICT,
                "duplicate",
                &format!("Domain '{}' already exists", new.domain_name),
            );
        }
        Ok(None) => {}
        Err(e) => return storage_error_response(&e),
    }

    let verdict = state.prober.probe(&new.domain_name).await;
    let now = state.clock.now();
    let record = apply_verdict(new.into_record(now), &verdict, now);

    // The unique index still catches a registration racing this one.
    match state.store.insert_domain(&record).await {
        Ok(domain) => {
            tracing::info!(
                domain = %domain.domain_name,
                status = %domain.certificate_status,
                "Domain registered"
            );
            (StatusCode::CREATED, Json(CheckedDomain { domain, verdict })).into_response()
        }
        Err(e) => storage_error_response(&e),
    }
}

// GET /api/domains/{id}
async fn get_domain(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.get_domain_by_id(id).await {
        Ok(Some(domain)) => Json(domain).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found", "Domain not found"),
        Err(e) => storage_error_response(&e),
    }
}

// PUT /api/domains/{id}
async fn update_domain(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateDomainRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(body) => body,
        Err(rejection) => return bad_body_response(&rejection),
    };
    let settings = match req.validate() {
        Ok(s) => s,
        Err(e) => return validation_error_response(&e),
    };
    match state.store.update_domain_settings(id, &settings).await {
        Ok(domain) => Json(domain).into_response(),
        Err(e) => storage_error_response(&e),
    }
}

// DELETE /api/domains/{id}
async fn delete_domain(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.delete_domain(id).await {
        Ok(true) => message_response("Domain deleted"),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "not_found", "Domain not found"),
        Err(e) => storage_error_response(&e),
    }
}

// POST /api/domains/{id}/check
async fn check_domain(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    let record = match state.store.get_domain_by_id(id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "not_found", "Domain not found")
        }
        Err(e) => return storage_error_response(&e),
    };
    match check_and_store(&state, record).await {
        Ok(checked) => Json(checked).into_response(),
        Err(e) => storage_error_response(&e),
    }
}

// PUT /api/domains/{id}/auto-renewal
async fn toggle_auto_renewal(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.toggle_auto_renewal(id).await {
        Ok(domain) => Json(domain).into_response(),
        Err(e) => storage_error_response(&e),
    }
}

#[derive(Debug, Serialize)]
struct BulkCheckResponse {
    checked: usize,
    valid: usize,
    invalid: usize,
    results: Vec<CheckedDomain>,
}

// POST /api/domains/check
async fn check_all_domains(State(state): State<AppState>) -> Response {
    let domains = match state.store.list_domains().await {
        Ok(d) => d,
        Err(e) => return storage_error_response(&e),
    };

    let semaphore = Arc::new(Semaphore::new(state.config.cert_check.max_concurrent.max(1)));
    let mut handles = Vec::with_capacity(domains.len());
    for record in domains {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(p) => p,
            Err(_) => break,
        };
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            let name = record.domain_name.clone();
            let result = check_and_store(&state, record).await;
            drop(permit);
            (name, result)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok((_, Ok(checked))) => results.push(checked),
            // Deleted while the bulk check was running.
            Ok((name, Err(e))) if e.is_not_found() => {
                tracing::debug!(domain = %name, "Domain vanished during bulk check");
            }
            Ok((name, Err(e))) => {
                tracing::error!(domain = %name, error = %e, "Failed to store check result");
            }
            Err(e) => tracing::error!(error = %e, "Certificate check task failed"),
        }
    }

    let valid = results.iter().filter(|c| c.verdict.is_valid).count();
    tracing::info!(checked = results.len(), valid, "Bulk certificate check finished");
    Json(BulkCheckResponse {
        checked: results.len(),
        valid,
        invalid: results.len() - valid,
        results,
    })
    .into_response()
}

// POST /api/ssl/check
async fn check_ssl(
    State(state): State<AppState>,
    payload: Result<Json<CheckDomainRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(body) => body,
        Err(rejection) => return bad_body_response(&rejection),
    };
    if req.domain.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "domain cannot be empty",
        );
    }
    Json(state.prober.probe(&req.domain).await).into_response()
}

pub fn cert_routes() -> Router<AppState> {
    Router::new()
        .route("/api/domains", get(list_domains).post(create_domain))
        .route("/api/domains/check", post(check_all_domains))
        .route(
            "/api/domains/{id}",
            get(get_domain).put(update_domain).delete(delete_domain),
        )
        .route("/api/domains/{id}/check", post(check_domain))
        .route("/api/domains/{id}/auto-renewal", put(toggle_auto_renewal))
        .route("/api/ssl/check", post(check_ssl))
}
