use std::sync::Arc;
use std::time::Duration;

use acr_config::ReconcilerConfig;
use acr_oracle::{AccrualOracle, OracleError};
use acr_reconcile::{decide, Transition};
use acr_schemas::OrderNumber;
use chrono::Utc;
use futures_util::{stream, StreamExt};
use tokio::sync::Mutex;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::{
    FailureKind, LedgerStore, OrderLocks, OrderOutcome, OutcomeKind, PassReport, PassStatus,
    RateGate,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub pass_deadline: Duration,
    pub store_timeout: Duration,
    /// Orders in flight at once; clamped to >= 1.
    pub max_in_flight: usize,
    /// Pause after a 429 that had no usable Retry-After.
    pub rate_limit_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pass_deadline: Duration::from_secs(60),
            store_timeout: Duration::from_secs(5),
            max_in_flight: 4,
            rate_limit_backoff: Duration::from_secs(60),
        }
    }
}

impl WorkerConfig {
    pub fn from_config(cfg: &ReconcilerConfig) -> Self {
        Self {
            pass_deadline: cfg.pass_deadline(),
            store_timeout: cfg.store_timeout(),
            max_in_flight: cfg.reconcile.max_in_flight.max(1),
            rate_limit_backoff: cfg.rate_limit_backoff(),
        }
    }
}

/// Drives reconciliation passes. Share it behind an `Arc`.
pub struct ReconcileWorker {
    store: Arc<dyn LedgerStore>,
    oracle: Arc<dyn AccrualOracle>,
    cfg: WorkerConfig,
    pass_gate: Mutex<()>,
    locks: OrderLocks,
    rate_gate: RateGate,
}

impl ReconcileWorker {
    pub fn new(store: Arc<dyn LedgerStore>, oracle: Arc<dyn AccrualOracle>, cfg: WorkerConfig) -> Self {
        Self {
            store,
            oracle,
            cfg,
            pass_gate: Mutex::new(()),
            locks: OrderLocks::new(),
            rate_gate: RateGate::new(),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.cfg
    }

    pub fn rate_gate(&self) -> &RateGate {
        &self.rate_gate
    }

    pub fn order_locks(&self) -> &OrderLocks {
        &self.locks
    }

    pub fn is_pass_running(&self) -> bool {
        self.pass_gate.try_lock().is_err()
    }

    /// Run one pass over every pending order.
    ///
    /// Returns immediately with `PassStatus::Overlapped` if a pass is already
    /// running. `deadline_override` replaces the configured pass deadline for
    /// this pass only.
    pub async fn run_pass(&self, deadline_override: Option<Duration>) -> PassReport {
        let pass_id = Uuid::new_v4();
        let started_at_utc = Utc::now();

        let Ok(_gate) = self.pass_gate.try_lock() else {
            info!(%pass_id, "pass skipped: previous pass still running");
            return PassReport::overlapped(pass_id, started_at_utc);
        };

        let budget = deadline_override.unwrap_or(self.cfg.pass_deadline);
        self.run_pass_locked(pass_id, started_at_utc, budget)
            .instrument(info_span!("reconcile_pass", %pass_id))
            .await
    }

    async fn run_pass_locked(
        &self,
        pass_id: Uuid,
        started_at_utc: chrono::DateTime<Utc>,
        budget: Duration,
    ) -> PassReport {
        let deadline = Instant::now() + budget;
        let mut report = PassReport::begin(pass_id, started_at_utc);

        let list_deadline = deadline.min(Instant::now() + self.cfg.store_timeout);
        let orders = match timeout_at(list_deadline, self.store.list_pending_orders()).await {
            Ok(Ok(orders)) => orders,
            Ok(Err(e)) => {
                warn!(error = %e, "pass aborted: pending order listing failed");
                return report.finish(PassStatus::ListingFailed, Some(e.to_string()));
            }
            Err(_) => {
                warn!("pass aborted: pending order listing timed out");
                return report.finish(
                    PassStatus::ListingFailed,
                    Some("pending order listing timed out".to_string()),
                );
            }
        };

        report.listed = orders.len();
        debug!(listed = report.listed, "pending orders listed");

        let mut positioned: Vec<(usize, OrderOutcome)> = Vec::with_capacity(orders.len());
        let mut results = stream::iter(orders.into_iter().enumerate())
            .map(|(i, order)| async move { (i, self.reconcile_order(order).await) })
            .buffer_unordered(self.cfg.max_in_flight.max(1));

        let status = loop {
            match timeout_at(deadline, results.next()).await {
                Ok(Some(done)) => positioned.push(done),
                Ok(None) => break PassStatus::Completed,
                Err(_) => break PassStatus::DeadlineExceeded,
            }
        };
        // Dropping the stream cancels in-flight orders; open transactions roll back.
        drop(results);

        positioned.sort_by_key(|(i, _)| *i);
        for (_, outcome) in positioned {
            report.record(outcome);
        }

        let error = (status == PassStatus::DeadlineExceeded)
            .then(|| format!("pass deadline of {}ms exceeded", budget.as_millis()));
        let report = report.finish(status, error);

        if report.status == PassStatus::DeadlineExceeded {
            warn!(
                listed = report.listed,
                abandoned = report.abandoned,
                "pass deadline exceeded; unreached orders stay pending"
            );
        }
        info!(
            status = ?report.status,
            listed = report.listed,
            committed = report.committed,
            held = report.held,
            failed = report.failed,
            abandoned = report.abandoned,
            credited = %report.credited_total,
            "pass finished"
        );
        report
    }

    async fn reconcile_order(&self, order: OrderNumber) -> OrderOutcome {
        let Some(_lease) = self.locks.try_acquire(&order) else {
            debug!(order = %order, "order already in flight; skipped");
            return OrderOutcome::new(order, OutcomeKind::Skipped);
        };

        self.rate_gate.wait().await;

        let report = match self.oracle.fetch_status(&order).await {
            Ok(r) => r,
            Err(e) => {
                if let OracleError::RateLimited { retry_after } = &e {
                    let pause = retry_after.unwrap_or(self.cfg.rate_limit_backoff);
                    self.rate_gate.engage(pause);
                    warn!(order = %order, pause_ms = pause.as_millis() as u64, "accrual service rate limit hit");
                } else {
                    warn!(order = %order, error = %e, "accrual fetch failed");
                }
                return failed(order, oracle_failure_kind(&e), e.to_string());
            }
        };

        let commit = match decide(&order, &report) {
            Transition::Commit(c) => c,
            Transition::Hold { observed } => {
                debug!(order = %order, status = %observed, "order still pending at accrual service");
                return OrderOutcome::new(
                    order,
                    OutcomeKind::Held {
                        observed: observed.as_str().to_string(),
                    },
                );
            }
            Transition::Anomaly(a) => {
                warn!(order = %order, error = %a, "accrual report rejected");
                return failed(order, FailureKind::OracleDecode, a.to_string());
            }
        };

        match timeout(self.cfg.store_timeout, self.store.commit(&commit)).await {
            Ok(Ok(receipt)) => {
                if receipt.applied {
                    info!(
                        order = %order,
                        status = %commit.status(),
                        owner = %receipt.owner,
                        credited = ?receipt.credited.map(|c| c.to_string()),
                        "order committed"
                    );
                } else {
                    debug!(order = %order, "order already terminal in ledger");
                }
                OrderOutcome::new(
                    order,
                    OutcomeKind::Committed {
                        status: commit.status(),
                        owner: receipt.owner,
                        applied: receipt.applied,
                        credited: receipt.credited,
                    },
                )
            }
            Ok(Err(e)) => {
                warn!(order = %order, error = %e, "ledger commit failed");
                failed(order, e.failure_kind(), e.to_string())
            }
            Err(_) => {
                warn!(order = %order, "ledger commit timed out");
                failed(order, FailureKind::StatusWrite, "ledger commit timed out".to_string())
            }
        }
    }
}

fn failed(order: OrderNumber, kind: FailureKind, error: String) -> OrderOutcome {
    OrderOutcome::new(order, OutcomeKind::Failed { kind, error })
}

fn oracle_failure_kind(e: &OracleError) -> FailureKind {
    match e {
        OracleError::Transport(_) | OracleError::Config(_) => FailureKind::OracleTransport,
        OracleError::RateLimited { .. } => FailureKind::OracleRateLimited,
        OracleError::Status { .. } => FailureKind::OracleStatus,
        OracleError::Decode(_) => FailureKind::OracleDecode,
    }
}
