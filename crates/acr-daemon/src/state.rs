//! Shared runtime state for acr-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The worker itself
//! owns pass exclusion; this module only mirrors what passes did.

use std::sync::Arc;
use std::time::Duration;

use acr_runtime::{PassReport, PassStatus, PassSummary, ReconcileWorker};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    PassCompleted(PassSummary),
    LogLine { level: String, msg: String },
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Returned by GET /v1/status and carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// Passes that actually ran (overlapped triggers are not counted).
    pub passes_completed: u64,
    pub pass_in_progress: bool,
    pub last_pass: Option<PassSummary>,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub status: Arc<RwLock<StatusSnapshot>>,
    pub worker: Arc<ReconcileWorker>,
}

impl AppState {
    pub fn new(worker: Arc<ReconcileWorker>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        Self {
            bus,
            build: BuildInfo {
                service: "acr-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            status: Arc::new(RwLock::new(StatusSnapshot {
                daemon_uptime_secs: uptime_secs(),
                passes_completed: 0,
                pass_in_progress: false,
                last_pass: None,
            })),
            worker,
        }
    }

    /// Current snapshot with live uptime and pass flag.
    pub async fn snapshot(&self) -> StatusSnapshot {
        let mut snap = self.status.read().await.clone();
        snap.daemon_uptime_secs = uptime_secs();
        snap.pass_in_progress = self.worker.is_pass_running();
        snap
    }

    /// Fold a finished pass into the status and announce it on the bus.
    pub async fn record_pass(&self, report: &PassReport) {
        if report.status == PassStatus::Overlapped {
            return;
        }
        let summary = report.summary();
        {
            let mut s = self.status.write().await;
            s.passes_completed += 1;
            s.last_pass = Some(summary.clone());
        }
        let _ = self.bus.send(BusMsg::PassCompleted(summary));
        if matches!(report.status, PassStatus::ListingFailed | PassStatus::DeadlineExceeded) {
            let _ = self.bus.send(BusMsg::LogLine {
                level: "WARN".to_string(),
                msg: format!(
                    "pass {} ended {:?}: {}",
                    report.pass_id,
                    report.status,
                    report.error.as_deref().unwrap_or("")
                ),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    })
}

/// Spawn the periodic reconciliation loop; every report lands in `state`.
pub fn spawn_periodic_passes(state: Arc<AppState>, interval: Duration) -> JoinHandle<()> {
    let worker = Arc::clone(&state.worker);
    acr_runtime::spawn_reconcile_loop(worker, interval, move |report| {
        let st = Arc::clone(&state);
        async move { st.record_pass(&report).await }
    })
}
