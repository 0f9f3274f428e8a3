use acr_schemas::{Micros, OracleReport, OracleStatus, OrderNumber};

use crate::{LedgerCommit, ReportAnomaly, Transition};

/// Interpret the accrual service's report for `expected`.
///
/// - Report for another order => anomaly (never applied)
/// - PROCESSED with negative accrual => anomaly
/// - PROCESSED => commit with accrual (missing accrual counts as zero)
/// - INVALID => commit INVALID, reported accrual dropped
/// - anything else => hold
pub fn decide(expected: &OrderNumber, report: &OracleReport) -> Transition {
    if &report.order != expected {
        return Transition::Anomaly(ReportAnomaly::OrderMismatch {
            expected: expected.clone(),
            reported: report.order.clone(),
        });
    }

    match &report.status {
        OracleStatus::Processed => {
            let accrual = report.accrual.unwrap_or(Micros::ZERO);
            if accrual.is_negative() {
                return Transition::Anomaly(ReportAnomaly::NegativeAccrual { accrual });
            }
            Transition::Commit(LedgerCommit::Processed {
                order: expected.clone(),
                accrual_micros: accrual,
            })
        }
        OracleStatus::Invalid => Transition::Commit(LedgerCommit::Invalid {
            order: expected.clone(),
        }),
        OracleStatus::Registered
        | OracleStatus::Processing
        | OracleStatus::NotRegistered
        | OracleStatus::Unrecognized(_) => Transition::Hold {
            observed: report.status.clone(),
        },
    }
}
