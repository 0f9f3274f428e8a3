//! Scenario: every non-terminal answer holds the order.

use std::sync::Arc;

use acr_runtime::{OutcomeKind, WorkerConfig};
use acr_schemas::{OracleStatus, OrderStatus};
use acr_testkit::{micros, order_number, worker, MemoryLedger, ScriptedOracle};

#[tokio::test]
async fn registered_processing_unknown_and_unregistered_are_held() {
    let ledger = Arc::new(MemoryLedger::new());
    let oracle = Arc::new(ScriptedOracle::new());

    let cases = [
        ("1", OracleStatus::Registered),
        ("2", OracleStatus::Processing),
        ("3", OracleStatus::NotRegistered),
        ("4", OracleStatus::Unrecognized("ON_REVIEW".to_string())),
    ];
    for (n, status) in &cases {
        let n = order_number(n);
        ledger.insert_order(&n, "erin");
        oracle.answer(&n, status.clone(), None);
    }

    let w = worker(&ledger, &oracle, WorkerConfig::default());
    let report = w.run_pass(None).await;

    assert_eq!(report.held, 4);
    assert_eq!(report.committed, 0);
    for (n, status) in &cases {
        let n = order_number(n);
        assert_eq!(ledger.status_of(&n), Some(OrderStatus::New));
        assert_eq!(
            report.outcome_for(&n).unwrap().kind,
            OutcomeKind::Held {
                observed: status.as_str().to_string()
            }
        );
    }

    // Listed again next pass.
    let again = w.run_pass(None).await;
    assert_eq!(again.listed, 4);
    assert_eq!(ledger.balance_of("erin"), micros("0"));
}
