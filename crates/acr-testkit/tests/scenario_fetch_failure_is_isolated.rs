//! Scenario: a failure on order A never prevents order B from being
//! reconciled, whatever kind of failure A hits.

use std::sync::Arc;

use acr_oracle::OracleError;
use acr_runtime::{FailureKind, WorkerConfig};
use acr_schemas::{OracleReport, OracleStatus, OrderStatus};
use acr_testkit::{micros, order_number, worker, MemoryLedger, ScriptedOracle};

#[tokio::test]
async fn each_failure_kind_is_contained_to_its_order() {
    let ledger = Arc::new(MemoryLedger::new());
    let oracle = Arc::new(ScriptedOracle::new());

    let transport = order_number("10");
    let decode = order_number("11");
    let mismatch = order_number("12");
    let good = order_number("13");

    for n in [&transport, &decode, &mismatch, &good] {
        ledger.insert_order(n, "hank");
    }

    oracle.fail(&transport, OracleError::Transport("connection reset".to_string()));
    oracle.fail(&decode, OracleError::Decode("malformed body".to_string()));
    // Service answers about a different order than the one asked for.
    oracle.script_for(
        &mismatch,
        vec![Ok(OracleReport::new(
            order_number("99"),
            OracleStatus::Processed,
            Some(micros("1000")),
        ))],
    );
    oracle.answer(&good, OracleStatus::Processed, Some(micros("12.5")));

    let w = worker(&ledger, &oracle, WorkerConfig::default());
    let report = w.run_pass(None).await;

    assert_eq!(report.failed, 3);
    assert_eq!(report.committed, 1);
    assert_eq!(
        report.outcome_for(&transport).unwrap().failure(),
        Some(FailureKind::OracleTransport)
    );
    assert_eq!(
        report.outcome_for(&decode).unwrap().failure(),
        Some(FailureKind::OracleDecode)
    );
    assert_eq!(
        report.outcome_for(&mismatch).unwrap().failure(),
        Some(FailureKind::OracleDecode)
    );

    assert_eq!(ledger.status_of(&good), Some(OrderStatus::Processed));
    for n in [&transport, &decode, &mismatch] {
        assert_eq!(ledger.status_of(n), Some(OrderStatus::New));
    }
    assert_eq!(ledger.balance_of("hank"), micros("12.5"));
}

#[tokio::test]
async fn failed_order_is_retried_next_pass() {
    let ledger = Arc::new(MemoryLedger::new());
    let oracle = Arc::new(ScriptedOracle::new());
    let n = order_number("20");
    ledger.insert_order(&n, "ivy");

    oracle.script_for(
        &n,
        vec![
            Err(OracleError::Transport("timeout".to_string())),
            Ok(OracleReport::new(n.clone(), OracleStatus::Processed, Some(micros("3")))),
        ],
    );

    let w = worker(&ledger, &oracle, WorkerConfig::default());
    assert_eq!(w.run_pass(None).await.failed, 1);
    assert_eq!(ledger.status_of(&n), Some(OrderStatus::New));

    assert_eq!(w.run_pass(None).await.committed, 1);
    assert_eq!(ledger.balance_of("ivy"), micros("3"));
}
