//! Scenario: INVALID is terminal and never credits, whatever accrual the
//! service sends along with it.

use std::sync::Arc;

use acr_runtime::{PassStatus, WorkerConfig};
use acr_schemas::{OracleStatus, OrderStatus};
use acr_testkit::{micros, order_number, worker, MemoryLedger, ScriptedOracle};

#[tokio::test]
async fn invalid_order_is_terminal_without_credit() {
    let ledger = Arc::new(MemoryLedger::new());
    let oracle = Arc::new(ScriptedOracle::new());
    let n = order_number("555");

    ledger.insert_order(&n, "dave");
    oracle.answer(&n, OracleStatus::Invalid, Some(micros("100")));

    let w = worker(&ledger, &oracle, WorkerConfig::default());
    let report = w.run_pass(None).await;

    assert_eq!(report.status, PassStatus::Completed);
    assert_eq!(report.committed, 1);
    assert_eq!(ledger.status_of(&n), Some(OrderStatus::Invalid));
    assert_eq!(ledger.accrual_of(&n), None);
    assert_eq!(ledger.balance_of("dave"), micros("0"));

    // Later PROCESSED answers cannot resurrect it.
    oracle.answer(&n, OracleStatus::Processed, Some(micros("100")));
    let again = w.run_pass(None).await;
    assert_eq!(again.listed, 0);
    assert_eq!(ledger.status_of(&n), Some(OrderStatus::Invalid));
    assert_eq!(ledger.balance_of("dave"), micros("0"));
}
