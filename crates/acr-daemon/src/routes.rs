//! Axum router and HTTP handlers for acr-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Tests compose the bare router directly.

use std::{convert::Infallible, sync::Arc, time::Duration};

use acr_runtime::PassStatus;
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::info;

use crate::{
    api_types::{BadRequestResponse, HealthResponse, PassConflictResponse, RunPassRequest},
    state::{AppState, BusMsg},
};

/// Middleware layers (CORS, tracing) are **not** applied here.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/status", get(status_handler))
        .route("/v1/stream", get(stream))
        .route("/v1/reconcile/run", post(reconcile_run))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/status
// ---------------------------------------------------------------------------

pub(crate) async fn status_handler(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    let snap = st.snapshot().await;
    let _ = st.bus.send(BusMsg::Status(snap.clone()));
    (StatusCode::OK, Json(snap))
}

// ---------------------------------------------------------------------------
// POST /v1/reconcile/run
// ---------------------------------------------------------------------------

/// Run one pass now and return its report.
///
/// Body is optional. `409` if a pass (periodic or on-demand) is running.
pub(crate) async fn reconcile_run(
    State(st): State<Arc<AppState>>,
    body: Option<Json<RunPassRequest>>,
) -> Response {
    let req = body.map(|Json(r)| r).unwrap_or_default();

    if req.deadline_ms == Some(0) {
        return (
            StatusCode::BAD_REQUEST,
            Json(BadRequestResponse {
                error: "deadline_ms must be > 0".to_string(),
            }),
        )
            .into_response();
    }

    let report = st
        .worker
        .run_pass(req.deadline_ms.map(Duration::from_millis))
        .await;

    if report.status == PassStatus::Overlapped {
        return (
            StatusCode::CONFLICT,
            Json(PassConflictResponse {
                error: "PASS_IN_PROGRESS: a reconciliation pass is already running".to_string(),
            }),
        )
            .into_response();
    }

    info!(pass_id = %report.pass_id, status = ?report.status, "reconcile/run");
    st.record_pass(&report).await;
    (StatusCode::OK, Json(report)).into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let event_name = match &m {
                    BusMsg::Heartbeat { .. } => "heartbeat",
                    BusMsg::Status(_) => "status",
                    BusMsg::PassCompleted(_) => "pass_completed",
                    BusMsg::LogLine { .. } => "log",
                };
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(event_name).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}
