//! Internal HTTP Routes
//!
//! Endpoints the two PODs call on each other, plus the refresh push
//! receiver and a health check.
//!
//! - `GET  /internal/prov`: provisioning snapshot document
//! - `GET  /internal/logs`: persisted record id bitset
//! - `POST /internal/logs`: `LOG` lines for the ids in the request bitset
//! - `GET  /internal/fetchProv`: request an out-of-cycle snapshot pull
//! - `GET  /health`

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::bitset::RangeBitset;
use crate::logs::LogIngestor;
use crate::notify::ChangeNotifier;
use crate::provisioning::PROVFULL_CONTENT_TYPE_V2;
use crate::replication::{ReplicationCoordinator, FETCH_PROV_PATH, LOGS_PATH, PROV_PATH, TEXT_PLAIN};

/// State shared by the internal handlers
pub struct InternalState {
    pub coordinator: Arc<ReplicationCoordinator>,
    pub notifier: Arc<ChangeNotifier>,
    pub ingestor: Arc<LogIngestor>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub role: String,
    pub ingest_idle: bool,
    pub records: u64,
    pub fetch_pending: bool,
}

/// Create internal routes
pub fn internal_routes(state: Arc<InternalState>) -> Router {
    Router::new()
        .route(PROV_PATH, get(snapshot_handler))
        .route(LOGS_PATH, get(bitset_handler).post(fetch_records_handler))
        .route(FETCH_PROV_PATH, get(fetch_prov_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

fn text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, TEXT_PLAIN)], body).into_response()
}

async fn snapshot_handler(State(state): State<Arc<InternalState>>) -> Response {
    let document = state.notifier.snapshot_document();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, PROVFULL_CONTENT_TYPE_V2)],
        document.as_str().to_owned(),
    )
        .into_response()
}

async fn bitset_handler(State(state): State<Arc<InternalState>>) -> Response {
    text(StatusCode::OK, state.ingestor.bitset().to_string())
}

async fn fetch_records_handler(State(state): State<Arc<InternalState>>, body: String) -> Response {
    let wanted: RangeBitset = match body.parse() {
        Ok(wanted) => wanted,
        Err(e) => return text(StatusCode::BAD_REQUEST, format!("{}\n", e)),
    };

    let store = Arc::clone(state.ingestor.store());
    let fetched = tokio::task::spawn_blocking(move || store.fetch(&wanted)).await;

    match fetched {
        Ok(Ok(records)) => {
            let mut out = String::new();
            for record in &records {
                out.push_str(&record.to_log_line());
                out.push('\n');
            }
            tracing::debug!(records = records.len(), "served log records to peer");
            text(StatusCode::OK, out)
        }
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "record fetch failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e))
        }
        Err(e) => {
            tracing::error!(error = %e, "record fetch panicked");
            text(StatusCode::INTERNAL_SERVER_ERROR, "internal error\n".to_string())
        }
    }
}

async fn fetch_prov_handler(State(state): State<Arc<InternalState>>) -> StatusCode {
    state.coordinator.request_fetch();
    tracing::info!("refresh push received; snapshot pull requested");
    StatusCode::NO_CONTENT
}

async fn health_handler(State(state): State<Arc<InternalState>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        role: state.coordinator.monitor().current().as_str().to_string(),
        ingest_idle: state.ingestor.is_idle(),
        records: state.ingestor.bitset().cardinality(),
        fetch_pending: state.coordinator.fetch_requested(),
    };

    (StatusCode::OK, Json(response))
}
