//! Scenario: orders within a pass run through a bounded pool, and
//! `max_in_flight = 1` is strictly sequential.

use std::sync::Arc;
use std::time::Duration;

use acr_runtime::{PassStatus, WorkerConfig};
use acr_schemas::OracleStatus;
use acr_testkit::{micros, order_number, worker, MemoryLedger, ScriptedOracle};

async fn run_with(max_in_flight: usize) -> (Arc<MemoryLedger>, Arc<ScriptedOracle>, PassStatus) {
    let ledger = Arc::new(MemoryLedger::new());
    let oracle = Arc::new(ScriptedOracle::new());
    for i in 0..8 {
        let n = order_number(&format!("{}", 8000 + i));
        ledger.insert_order(&n, "quinn");
        oracle.answer(&n, OracleStatus::Processed, Some(micros("1.5")));
    }
    oracle.set_default_delay(Some(Duration::from_millis(50)));

    let w = worker(
        &ledger,
        &oracle,
        WorkerConfig {
            max_in_flight,
            ..WorkerConfig::default()
        },
    );
    let status = w.run_pass(None).await.status;
    (ledger, oracle, status)
}

#[tokio::test(start_paused = true)]
async fn pool_never_exceeds_max_in_flight() {
    let (ledger, oracle, status) = run_with(3).await;
    assert_eq!(status, PassStatus::Completed);
    assert_eq!(oracle.max_in_flight_seen(), 3);
    assert_eq!(ledger.balance_of("quinn"), micros("12"));
}

#[tokio::test(start_paused = true)]
async fn single_slot_is_sequential() {
    let (ledger, oracle, status) = run_with(1).await;
    assert_eq!(status, PassStatus::Completed);
    assert_eq!(oracle.max_in_flight_seen(), 1);
    assert_eq!(ledger.balance_of("quinn"), micros("12"));
}
