use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{PassReport, ReconcileWorker};

/// Spawn a task that runs a pass every `interval` and hands each report to
/// `on_report`.
///
/// The first pass starts immediately. A pass that runs longer than `interval`
/// delays the next tick instead of bunching ticks up; on-demand passes that
/// collide with a tick come back `Overlapped`.
pub fn spawn_reconcile_loop<F, Fut>(
    worker: Arc<ReconcileWorker>,
    interval: Duration,
    on_report: F,
) -> JoinHandle<()>
where
    F: Fn(PassReport) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = worker.run_pass(None).await;
            on_report(report).await;
        }
    })
}
