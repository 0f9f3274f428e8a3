use acr_schemas::{Micros, OrderNumber, OrderStatus, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why an order (or a whole pass) did not reach a decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Pending orders could not be listed; the pass did nothing.
    ListingFailure,
    OracleTransport,
    /// Non-2xx answer other than 429.
    OracleStatus,
    OracleRateLimited,
    /// Malformed body, or a report that could not be applied.
    OracleDecode,
    StatusWrite,
    Credit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassStatus {
    Completed,
    ListingFailed,
    DeadlineExceeded,
    /// Another pass was already running; this trigger did nothing.
    Overlapped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Committed {
        status: OrderStatus,
        owner: UserId,
        /// `false` if the order was already terminal in the ledger.
        applied: bool,
        credited: Option<Micros>,
    },
    Held {
        observed: String,
    },
    Failed {
        kind: FailureKind,
        error: String,
    },
    /// Another task in this process held the order's lease.
    Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOutcome {
    pub order: OrderNumber,
    #[serde(flatten)]
    pub kind: OutcomeKind,
}

impl OrderOutcome {
    pub fn new(order: OrderNumber, kind: OutcomeKind) -> Self {
        Self { order, kind }
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match &self.kind {
            OutcomeKind::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Everything one pass did, in listing order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub started_at_utc: DateTime<Utc>,
    pub finished_at_utc: DateTime<Utc>,
    pub status: PassStatus,
    /// Pass-level error (listing failure, deadline).
    pub error: Option<String>,
    pub listed: usize,
    pub committed: usize,
    pub held: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Listed but never reached before the deadline.
    pub abandoned: usize,
    pub credited_total: Micros,
    pub outcomes: Vec<OrderOutcome>,
}

/// `PassReport` without per-order detail (status endpoint, SSE).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub pass_id: Uuid,
    pub started_at_utc: DateTime<Utc>,
    pub finished_at_utc: DateTime<Utc>,
    pub status: PassStatus,
    pub error: Option<String>,
    pub listed: usize,
    pub committed: usize,
    pub held: usize,
    pub failed: usize,
    pub skipped: usize,
    pub abandoned: usize,
    pub credited_total: Micros,
}

impl PassReport {
    pub(crate) fn begin(pass_id: Uuid, started_at_utc: DateTime<Utc>) -> Self {
        Self {
            pass_id,
            started_at_utc,
            finished_at_utc: started_at_utc,
            status: PassStatus::Completed,
            error: None,
            listed: 0,
            committed: 0,
            held: 0,
            failed: 0,
            skipped: 0,
            abandoned: 0,
            credited_total: Micros::ZERO,
            outcomes: Vec::new(),
        }
    }

    pub(crate) fn overlapped(pass_id: Uuid, started_at_utc: DateTime<Utc>) -> Self {
        Self::begin(pass_id, started_at_utc).finish(PassStatus::Overlapped, None)
    }

    pub(crate) fn record(&mut self, outcome: OrderOutcome) {
        match &outcome.kind {
            OutcomeKind::Committed { credited, .. } => {
                self.committed += 1;
                if let Some(c) = credited {
                    self.credited_total = self.credited_total.saturating_add(*c);
                }
            }
            OutcomeKind::Held { .. } => self.held += 1,
            OutcomeKind::Failed { .. } => self.failed += 1,
            OutcomeKind::Skipped => self.skipped += 1,
        }
        self.outcomes.push(outcome);
    }

    pub(crate) fn finish(mut self, status: PassStatus, error: Option<String>) -> Self {
        self.status = status;
        self.error = error;
        self.abandoned = self.listed.saturating_sub(self.outcomes.len());
        self.finished_at_utc = Utc::now();
        self
    }

    pub fn outcome_for(&self, order: &OrderNumber) -> Option<&OrderOutcome> {
        self.outcomes.iter().find(|o| &o.order == order)
    }

    pub fn summary(&self) -> PassSummary {
        PassSummary {
            pass_id: self.pass_id,
            started_at_utc: self.started_at_utc,
            finished_at_utc: self.finished_at_utc,
            status: self.status,
            error: self.error.clone(),
            listed: self.listed,
            committed: self.committed,
            held: self.held,
            failed: self.failed,
            skipped: self.skipped,
            abandoned: self.abandoned,
            credited_total: self.credited_total,
        }
    }
}
