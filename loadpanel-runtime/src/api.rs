//! Axum-based HTTP API for the load panel.
//!
//! Provides REST endpoints for:
//! - Provisioning the sandbox
//! - Starting and stopping load jobs
//! - Querying sandbox identity and busy targets

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::api_types::{
    ProvisionResponse, StartLoadRequest, StartLoadResponse, StatusResponse, StopLoadRequest,
    StopLoadResponse,
};
use crate::error::PanelError;
use crate::supervisor::{LoadPanel, StartParams};

/// Sandbox-identity marker reported while nothing is provisioned.
const SANDBOX_UNSET: &str = "unset";

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct ApiError {
    error: String,
}

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (status, Json(ApiError { error: msg.into() }))
}

/// A body that failed extraction (wrong types, malformed JSON) is a
/// validation failure like any other: 400 with the structured error shape,
/// not axum's plain-text rejection.
fn malformed_body(rejection: JsonRejection) -> (StatusCode, Json<ApiError>) {
    api_error(
        StatusCode::BAD_REQUEST,
        format!("invalid request body: {}", rejection.body_text()),
    )
}

fn error_response(err: &PanelError) -> (StatusCode, Json<ApiError>) {
    let status = match err {
        PanelError::Validation(_) => StatusCode::BAD_REQUEST,
        PanelError::Environment(_) => StatusCode::CONFLICT,
        PanelError::Provisioning(_) | PanelError::Docker(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, err.to_string())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn provision_sandbox(State(panel): State<Arc<LoadPanel>>) -> impl IntoResponse {
    match panel.provision().await {
        Ok(record) => (
            StatusCode::OK,
            Json(ProvisionResponse {
                status: "success".into(),
                sandbox_id: record.id,
            }),
        )
            .into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

async fn start_load(
    State(panel): State<Arc<LoadPanel>>,
    payload: Result<Json<StartLoadRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(json) => json,
        Err(rejection) => return malformed_body(rejection).into_response(),
    };
    let params = StartParams {
        targets: req.targets,
        requests: req.requests,
        concurrency: req.concurrency,
        duration_secs: req.duration,
    };
    match panel.start_load(params).await {
        Ok(started) => (
            StatusCode::OK,
            Json(StartLoadResponse {
                status: "success".into(),
                started,
            }),
        )
            .into_response(),
        Err(err) => error_response(&err).into_response(),
    }
}

async fn stop_load(
    State(panel): State<Arc<LoadPanel>>,
    payload: Result<Json<StopLoadRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(req) = match payload {
        Ok(json) => json,
        Err(rejection) => return malformed_body(rejection).into_response(),
    };
    match panel.stop_load(&req.targets).await {
        Ok(stopped) => {
            let status = if stopped.is_empty() {
                "no_active_jobs"
            } else {
                "success"
            };
            (
                StatusCode::OK,
                Json(StopLoadResponse {
                    status: status.into(),
                    stopped,
                }),
            )
                .into_response()
        }
        Err(err) => error_response(&err).into_response(),
    }
}

async fn panel_status(State(panel): State<Arc<LoadPanel>>) -> impl IntoResponse {
    let status = panel.status().await;
    (
        StatusCode::OK,
        Json(StatusResponse {
            sandbox_id: status.sandbox_id.unwrap_or_else(|| SANDBOX_UNSET.into()),
            busy_targets: status.busy_targets,
        }),
    )
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

// ---------------------------------------------------------------------------
// Router builder
// ---------------------------------------------------------------------------

/// Build the panel API router with all endpoints and CORS support.
pub fn router(panel: Arc<LoadPanel>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/sandbox", post(provision_sandbox))
        .route("/api/load/start", post(start_load))
        .route("/api/load/stop", post(stop_load))
        .route("/api/status", get(panel_status))
        .route("/api/health", get(health))
        .layer(cors)
        .with_state(panel)
}
