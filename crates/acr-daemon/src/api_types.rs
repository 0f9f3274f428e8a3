//! Request and response types for acr-daemon HTTP endpoints.
//!
//! No business logic lives here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/reconcile/run
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunPassRequest {
    /// Overrides the configured pass deadline for this pass only.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// 409 body when a pass is already running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassConflictResponse {
    pub error: String,
}

/// 400 body for a request the daemon refuses to act on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BadRequestResponse {
    pub error: String,
}
