//! Scenario: the periodic scheduler keeps running passes and hands every
//! report to its callback.

use std::sync::Arc;
use std::time::Duration;

use acr_runtime::{spawn_reconcile_loop, PassStatus, WorkerConfig};
use acr_schemas::{OracleStatus, OrderStatus};
use acr_testkit::{micros, order_number, worker, MemoryLedger, ScriptedOracle};
use tokio::sync::mpsc;

#[tokio::test(start_paused = true)]
async fn loop_picks_up_orders_that_turn_terminal_later() {
    let ledger = Arc::new(MemoryLedger::new());
    let oracle = Arc::new(ScriptedOracle::new());
    let n = order_number("9000");

    ledger.insert_order(&n, "rosa");
    oracle.answer(&n, OracleStatus::Processing, None);

    let w = worker(&ledger, &oracle, WorkerConfig::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = spawn_reconcile_loop(w, Duration::from_secs(10), move |report| {
        let tx = tx.clone();
        async move {
            let _ = tx.send(report);
        }
    });

    let first = rx.recv().await.unwrap();
    assert_eq!(first.status, PassStatus::Completed);
    assert_eq!(first.held, 1);

    oracle.answer(&n, OracleStatus::Processed, Some(micros("15")));

    let second = rx.recv().await.unwrap();
    assert_eq!(second.committed, 1);
    assert_eq!(ledger.status_of(&n), Some(OrderStatus::Processed));
    assert_eq!(ledger.balance_of("rosa"), micros("15"));

    let third = rx.recv().await.unwrap();
    assert_eq!(third.listed, 0);

    handle.abort();
}
