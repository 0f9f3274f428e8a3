//! acr-testkit
//!
//! In-memory doubles for the reconciliation worker's two seams, plus
//! helpers shared by the scenario tests in `tests/`.
//!
//! - [`MemoryLedger`]: `LedgerStore` with the same commit semantics as the
//!   Postgres store (atomic status + credit, one credit per order) and
//!   switchable faults.
//! - [`ScriptedOracle`]: `AccrualOracle` answering from a per-order script.
//!
//! No DB. No network.

mod memory_ledger;
mod scripted_oracle;

use std::sync::Arc;

use acr_runtime::{ReconcileWorker, WorkerConfig};
use acr_schemas::{Micros, OrderNumber};

pub use memory_ledger::MemoryLedger;
pub use scripted_oracle::{ScriptedOracle, ScriptedResponse};

/// Order number from a literal. Panics on non-digit input.
pub fn order_number(s: &str) -> OrderNumber {
    match OrderNumber::parse(s) {
        Ok(n) => n,
        Err(e) => panic!("bad order number literal {s:?}: {e}"),
    }
}

/// Micros from a decimal literal such as `"729.98"`. Panics on bad input.
pub fn micros(s: &str) -> Micros {
    match Micros::parse_decimal(s) {
        Ok(m) => m,
        Err(e) => panic!("bad money literal {s:?}: {e}"),
    }
}

/// Worker over the given doubles.
pub fn worker(
    ledger: &Arc<MemoryLedger>,
    oracle: &Arc<ScriptedOracle>,
    cfg: WorkerConfig,
) -> Arc<ReconcileWorker> {
    Arc::new(ReconcileWorker::new(
        Arc::clone(ledger) as Arc<dyn acr_runtime::LedgerStore>,
        Arc::clone(oracle) as Arc<dyn acr_oracle::AccrualOracle>,
        cfg,
    ))
}
