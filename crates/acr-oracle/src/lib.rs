//! acr-oracle
//!
//! Read-only client for the external accrual service.
//!
//! The service is the source of truth for an order's status and accrual.
//! This crate only asks; it never retries and never writes anything.
//! Callers decide what to do with each answer (see `acr-reconcile`).

use std::fmt;
use std::time::Duration;

use acr_schemas::{OracleReport, OrderNumber};

mod decode;
mod http;

pub use decode::{accrual_from_json, decode_report};
pub use http::HttpAccrualOracle;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Status source for one order at a time.
///
/// Object-safe so the worker can hold an `Arc<dyn AccrualOracle>`.
#[async_trait::async_trait]
pub trait AccrualOracle: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_status(&self, order: &OrderNumber) -> Result<OracleReport, OracleError>;
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Connect/read failure or client-side timeout.
    Transport(String),
    /// HTTP 429. `retry_after` is the parsed `Retry-After` seconds, if any.
    RateLimited { retry_after: Option<Duration> },
    /// Any other non-2xx answer.
    Status { code: u16, body: String },
    /// 2xx with a body that does not describe the requested order.
    Decode(String),
    /// Client could not be constructed.
    Config(String),
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleError::Transport(msg) => write!(f, "transport error: {msg}"),
            OracleError::RateLimited {
                retry_after: Some(d),
            } => write!(f, "rate limited; retry after {}s", d.as_secs()),
            OracleError::RateLimited { retry_after: None } => write!(f, "rate limited"),
            OracleError::Status { code, body } if body.is_empty() => {
                write!(f, "accrual service http status={code}")
            }
            OracleError::Status { code, body } => {
                write!(f, "accrual service http status={code} body={body}")
            }
            OracleError::Decode(msg) => write!(f, "decode error: {msg}"),
            OracleError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for OracleError {}
