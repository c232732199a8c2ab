// /////////////////////////////////////////////////////////////////////////////
// Metadata Harvester RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # REST Control Surface
//!
//! Translates pipeline and manager operations into HTTP. The handlers hold
//! a direct reference to the manager and registry; there is no event bus
//! between the boundary and the core.
//!
//! | Route | Effect |
//! |---|---|
//! | `GET /` | pretty plain-text status |
//! | `GET /.json` | manager JSON view |
//! | `GET /etl?name=<n>` | one pipeline's JSON view |
//! | `GET /outdated` | change-detection verdict |
//! | `GET /config` | registry snapshot |
//! | `POST /config` | set one parameter |
//! | `GET /log?date&class&level` | filtered log retrieval |
//! | `POST /` | start a harvest |
//! | `POST /abort` | request a cooperative abort |
//! | `POST /reset` | re-initialize |
//!
//! Status mapping: `200` on success and on precondition skips (the service
//! is healthy, just idle), `400` on malformed queries and rejected
//! parameter values, `503` with `Retry-After` while busy, `500` on internal
//! errors.

use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use harvester_bootstrap::shutdown::CancellationToken;
use harvester_domain::{EtlHealth, EtlState, HarvestError, TimestampedHistory};

use crate::application::services::{EtlManager, EtlMonitor};
use crate::infrastructure::config::ParameterRegistry;
use crate::infrastructure::logging::{read_log, LogQuery};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<EtlManager>,
    pub registry: Arc<ParameterRegistry>,
    pub log_dir: PathBuf,
}

/// Builds the REST router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status_text).post(start_harvest))
        .route("/.json", get(status_json))
        .route("/etl", get(etl_json))
        .route("/outdated", get(outdated))
        .route("/config", get(config_snapshot).post(set_parameter))
        .route("/log", get(log_retrieval))
        .route("/abort", post(abort_harvest))
        .route("/reset", post(reset))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves the router until the token cancels.
pub async fn serve(listen_address: &str, state: AppState, token: CancellationToken) -> Result<(), HarvestError> {
    let listener = tokio::net::TcpListener::bind(listen_address)
        .await
        .map_err(|e| HarvestError::io_error(format!("failed to bind '{}': {}", listen_address, e)))?;

    tracing::info!(address = listen_address, "REST surface listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .map_err(|e| HarvestError::io_error(format!("REST server failed: {}", e)))
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ManagerView {
    repository: String,
    state: EtlState,
    health: EtlHealth,
    #[serde(rename = "harvestedCount")]
    harvested_count: u64,
    #[serde(rename = "maxDocumentCount")]
    max_document_count: i64,
    #[serde(rename = "lastCombinedHash")]
    last_combined_hash: Option<String>,
    #[serde(rename = "remainingHarvestTime")]
    remaining_harvest_time: i64,
    etls: Vec<String>,
}

impl ManagerView {
    fn of(manager: &EtlManager) -> Self {
        Self {
            repository: manager.name().to_string(),
            state: manager.state(),
            health: manager.health(),
            harvested_count: manager.harvested_count(),
            max_document_count: manager.max_document_count(),
            last_combined_hash: manager.last_combined_hash(),
            remaining_harvest_time: manager.estimate_remaining_millis(),
            etls: manager.monitors().iter().map(|m| m.name()).collect(),
        }
    }
}

#[derive(Serialize)]
struct EtlView {
    name: String,
    state: EtlState,
    health: EtlHealth,
    enabled: bool,
    #[serde(rename = "harvestedCount")]
    harvested_count: u64,
    #[serde(rename = "maxDocumentCount")]
    max_document_count: i64,
    #[serde(rename = "versionHash")]
    version_hash: Option<String>,
    #[serde(rename = "stateHistory")]
    state_history: TimestampedHistory<EtlState>,
    #[serde(rename = "healthHistory")]
    health_history: TimestampedHistory<EtlHealth>,
}

impl EtlView {
    fn of(monitor: &EtlMonitor) -> Self {
        let info = monitor.snapshot();
        Self {
            name: info.name,
            state: monitor.state(),
            health: monitor.health(),
            enabled: monitor.is_enabled(),
            harvested_count: info.harvested_count,
            max_document_count: info.max_document_count,
            version_hash: info.version_hash,
            state_history: info.state_history,
            health_history: info.health_history,
        }
    }
}

#[derive(Serialize)]
struct Diagnostic {
    status: &'static str,
    message: String,
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Maps a core error to the HTTP contract. Busy carries `Retry-After` when
/// the remaining-time estimate is defined.
fn error_response(error: HarvestError, manager: &EtlManager) -> Response {
    match &error {
        HarvestError::Busy(_) => {
            let mut response = (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(Diagnostic {
                    status: "busy",
                    message: error.to_string(),
                }),
            )
                .into_response();

            let remaining_ms = manager.estimate_remaining_millis();
            if remaining_ms >= 0 {
                let seconds = (remaining_ms + 999) / 1000;
                if let Ok(value) = seconds.to_string().parse() {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
            response
        }
        HarvestError::PreconditionFailed(_) => (
            StatusCode::OK,
            Json(Diagnostic {
                status: "skipped",
                message: error.to_string(),
            }),
        )
            .into_response(),
        HarvestError::NotFound(_)
        | HarvestError::InvalidParameterValue { .. }
        | HarvestError::InvalidName(_)
        | HarvestError::InvalidConfiguration(_) => (
            StatusCode::BAD_REQUEST,
            Json(Diagnostic {
                status: "rejected",
                message: error.to_string(),
            }),
        )
            .into_response(),
        _ => {
            error!(error = %error, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(Diagnostic {
                    status: "error",
                    message: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn status_text(State(state): State<AppState>) -> String {
    let manager = &state.manager;
    let mut lines = vec![
        format!("Metadata harvester '{}'", manager.name()),
        format!("State:     {}", manager.state()),
        format!("Health:    {}", manager.health()),
        format!(
            "Progress:  {} / {}",
            manager.harvested_count(),
            manager.max_document_count()
        ),
        format!(
            "Combined:  {}",
            manager.last_combined_hash().unwrap_or_else(|| "unknown".to_string())
        ),
    ];

    let remaining = manager.estimate_remaining_millis();
    if remaining >= 0 {
        lines.push(format!("Remaining: ~{}s", remaining / 1000));
    }

    lines.push(String::new());
    for monitor in manager.monitors() {
        lines.push(format!(
            "- {} [{}] {} ({} / {})",
            monitor.name(),
            monitor.state(),
            monitor.health(),
            monitor.harvested_count(),
            monitor.max_document_count()
        ));
    }

    lines.join("\n")
}

async fn status_json(State(state): State<AppState>) -> Json<impl Serialize> {
    Json(ManagerView::of(&state.manager))
}

#[derive(Deserialize)]
struct EtlQuery {
    name: Option<String>,
}

async fn etl_json(State(state): State<AppState>, Query(query): Query<EtlQuery>) -> Response {
    let name = match query.name {
        Some(name) => name,
        None => {
            return error_response(
                HarvestError::not_found("missing query parameter 'name'"),
                &state.manager,
            )
        }
    };

    match state.manager.monitor_by_name(&name) {
        Some(monitor) => Json(EtlView::of(&monitor)).into_response(),
        None => error_response(
            HarvestError::not_found(format!("unknown pipeline '{}'", name)),
            &state.manager,
        ),
    }
}

async fn outdated(State(state): State<AppState>) -> Response {
    match state.manager.has_outdated_etls().await {
        Ok(outdated) => Json(serde_json::json!({ "outdated": outdated })).into_response(),
        Err(e) => error_response(e, &state.manager),
    }
}

async fn config_snapshot(State(state): State<AppState>) -> Json<impl Serialize> {
    let entries: Vec<serde_json::Value> = state
        .registry
        .snapshot()
        .into_iter()
        .map(|(key, value)| serde_json::json!({ "key": key, "value": value }))
        .collect();
    Json(entries)
}

#[derive(Deserialize)]
struct SetParameterRequest {
    key: String,
    value: String,
}

async fn set_parameter(State(state): State<AppState>, Json(request): Json<SetParameterRequest>) -> Response {
    match state.registry.set(&request.key, &request.value) {
        Ok(line) => (
            StatusCode::OK,
            Json(Diagnostic {
                status: "ok",
                message: line,
            }),
        )
            .into_response(),
        Err(e) => error_response(e, &state.manager),
    }
}

#[derive(Deserialize)]
struct LogParams {
    date: Option<String>,
    class: Option<String>,
    level: Option<String>,
}

async fn log_retrieval(State(state): State<AppState>, Query(params): Query<LogParams>) -> Response {
    let query = LogQuery {
        date: params.date,
        class: params.class,
        level: params.level,
    };
    match read_log(&state.log_dir, &query).await {
        Ok(content) => content.into_response(),
        Err(e) => error_response(e, &state.manager),
    }
}

async fn start_harvest(State(state): State<AppState>) -> Response {
    match state.manager.clone().harvest().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Diagnostic {
                status: "ok",
                message: "harvest started".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e, &state.manager),
    }
}

async fn abort_harvest(State(state): State<AppState>) -> Response {
    match state.manager.abort_harvest() {
        Ok(()) => (
            StatusCode::OK,
            Json(Diagnostic {
                status: "ok",
                message: "abort requested".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e, &state.manager),
    }
}

async fn reset(State(state): State<AppState>) -> Response {
    match state.manager.reset().await {
        Ok(()) => (
            StatusCode::OK,
            Json(Diagnostic {
                status: "ok",
                message: "re-initialized".to_string(),
            }),
        )
            .into_response(),
        Err(e) => error_response(e, &state.manager),
    }
}
