//! acr-runtime
//!
//! Reconciliation worker: lists pending orders, asks the accrual service
//! about each one, and commits terminal transitions through the ledger.
//!
//! Wiring:
//! - [`LedgerStore`] is the store seam ([`PgLedgerStore`] in production).
//! - [`acr_oracle::AccrualOracle`] is the status seam.
//! - [`ReconcileWorker::run_pass`] is the single trigger; the periodic
//!   scheduler and on-demand callers both go through it.
//!
//! Guarantees per pass:
//! - passes never overlap (second trigger gets `PassStatus::Overlapped`)
//! - one order's failure never stops the others
//! - nothing outlives the pass deadline; unreached orders are `abandoned`

mod locks;
mod rate_gate;
mod report;
mod schedule;
mod store;
mod worker;

pub use locks::{OrderLease, OrderLocks};
pub use rate_gate::RateGate;
pub use report::{FailureKind, OrderOutcome, OutcomeKind, PassReport, PassStatus, PassSummary};
pub use schedule::spawn_reconcile_loop;
pub use store::{CommitReceipt, LedgerStore, PgLedgerStore, StoreError};
pub use worker::{ReconcileWorker, WorkerConfig};
