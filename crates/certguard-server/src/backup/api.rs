use crate::api::{
    bad_body_response, error_response, message_response, storage_error_response,
    validation_error_response,
};
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use certguard_alert::engine::AlertDecision;
use certguard_common::types::{
    BackupRun, BackupStatus, ConcludeBackupRunRequest, CreateBackupRunRequest,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ConcludeResponse {
    message: &'static str,
    backup_log: BackupRun,
    /// `not_required`, `sent` or `send_failed`.
    alert: &'static str,
}

#[derive(Debug, Serialize)]
struct LatestIdResponse {
    id: i64,
}

#[derive(Debug, Serialize)]
struct LatestStatusResponse {
    backup_status: BackupStatus,
}

fn decision_label(decision: AlertDecision) -> &'static str {
    match decision {
        AlertDecision::NotRequired => "not_required",
        AlertDecision::Sent => "sent",
        AlertDecision::SendFailed => "send_failed",
    }
}

fn no_backup_record() -> Response {
    error_response(StatusCode::NOT_FOUND, "not_found", "No backup record found")
}

// GET /api/backup-logs
async fn list_backup_logs(State(state): State<AppState>) -> Response {
    match state.store.list_backup_runs().await {
        Ok(runs) => Json(runs).into_response(),
        Err(e) => storage_error_response(&e),
    }
}

// POST /api/backup-logs
async fn create_backup_log(
    State(state): State<AppState>,
    payload: Result<Json<CreateBackupRunRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(body) => body,
        Err(rejection) => return bad_body_response(&rejection),
    };
    let new = match req.validate() {
        Ok(new) => new,
        Err(e) => return validation_error_response(&e),
    };
    match state.store.insert_backup_run(&new).await {
        Ok(run) => {
            tracing::info!(id = run.id, ip = %run.ip, server = %run.server_name, "Backup run started");
            (StatusCode::CREATED, Json(run)).into_response()
        }
        Err(e) => storage_error_response(&e),
    }
}

// PUT /api/backup-logs/{id}
async fn conclude_backup_log(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<ConcludeBackupRunRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(body) => body,
        Err(rejection) => return bad_body_response(&rejection),
    };
    let update = match req.validate() {
        Ok(update) => update,
        Err(e) => return validation_error_response(&e),
    };

    match state.incidents.conclude(id, &update).await {
        Ok(outcome) => {
            tracing::info!(
                id,
                backup_status = ?outcome.run.backup_status,
                alert = decision_label(outcome.decision),
                "Backup run concluded"
            );
            Json(ConcludeResponse {
                message: "Backup log updated",
                backup_log: outcome.run,
                alert: decision_label(outcome.decision),
            })
            .into_response()
        }
        Err(e) => storage_error_response(&e),
    }
}

// DELETE /api/backup-logs/{id}
async fn delete_backup_log(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.store.delete_backup_run(id).await {
        Ok(true) => message_response("Backup log deleted"),
        Ok(false) => error_response(StatusCode::NOT_FOUND, "not_found", "Backup log not found"),
        Err(e) => storage_error_response(&e),
    }
}

// GET /api/backup-logs/latest/{ip}/id
async fn latest_backup_id(State(state): State<AppState>, Path(ip): Path<String>) -> Response {
    match state.store.latest_backup_run_by_ip(&ip).await {
        Ok(Some(run)) => Json(LatestIdResponse { id: run.id }).into_response(),
        Ok(None) => no_backup_record(),
        Err(e) => storage_error_response(&e),
    }
}

// GET /api/backup-logs/latest/{ip}/status
async fn latest_backup_status(State(state): State<AppState>, Path(ip): Path<String>) -> Response {
    match state.store.latest_backup_run_by_ip(&ip).await {
        Ok(Some(run)) => Json(LatestStatusResponse {
            backup_status: run.backup_status,
        })
        .into_response(),
        Ok(None) => no_backup_record(),
        Err(e) => storage_error_response(&e),
    }
}

pub fn backup_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/backup-logs",
            get(list_backup_logs).post(create_backup_log),
        )
        .route(
            "/api/backup-logs/{id}",
            put(conclude_backup_log).delete(delete_backup_log),
        )
        .route("/api/backup-logs/latest/{ip}/id", get(latest_backup_id))
        .route("/api/backup-logs/latest/{ip}/status", get(latest_backup_status))
}
