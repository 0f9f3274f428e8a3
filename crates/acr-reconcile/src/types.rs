use acr_schemas::{Micros, OracleStatus, OrderNumber, OrderStatus};
use serde::Serialize;

/// A terminal write the ledger must apply for one order.
///
/// The variant carries exactly the data its status allows: only a
/// `Processed` commit has an accrual.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerCommit {
    Processed {
        order: OrderNumber,
        accrual_micros: Micros,
    },
    Invalid {
        order: OrderNumber,
    },
}

impl LedgerCommit {
    pub fn order(&self) -> &OrderNumber {
        match self {
            LedgerCommit::Processed { order, .. } | LedgerCommit::Invalid { order } => order,
        }
    }

    pub fn status(&self) -> OrderStatus {
        match self {
            LedgerCommit::Processed { .. } => OrderStatus::Processed,
            LedgerCommit::Invalid { .. } => OrderStatus::Invalid,
        }
    }

    /// Accrual to persist on the order row (`None` for INVALID).
    pub fn accrual(&self) -> Option<Micros> {
        match self {
            LedgerCommit::Processed { accrual_micros, .. } => Some(*accrual_micros),
            LedgerCommit::Invalid { .. } => None,
        }
    }

    /// Amount to credit to the owner's balance, if any.
    pub fn credit(&self) -> Option<Micros> {
        self.accrual().filter(|a| a.is_positive())
    }
}

/// A report that cannot be acted on safely.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportAnomaly {
    /// The service answered for a different order than the one asked for.
    OrderMismatch {
        expected: OrderNumber,
        reported: OrderNumber,
    },
    NegativeAccrual { accrual: Micros },
}

impl std::fmt::Display for ReportAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportAnomaly::OrderMismatch { expected, reported } => write!(
                f,
                "accrual report for order {reported} returned when asking for {expected}"
            ),
            ReportAnomaly::NegativeAccrual { accrual } => {
                write!(f, "accrual report carries negative accrual {accrual}")
            }
        }
    }
}

/// Outcome of interpreting one report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    Commit(LedgerCommit),
    /// No transition; the order stays pending and is asked about next pass.
    Hold { observed: OracleStatus },
    Anomaly(ReportAnomaly),
}

impl Transition {
    pub fn is_commit(&self) -> bool {
        matches!(self, Transition::Commit(_))
    }
}
