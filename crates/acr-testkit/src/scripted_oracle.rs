use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use acr_oracle::{AccrualOracle, OracleError};
use acr_schemas::{Micros, OracleReport, OracleStatus, OrderNumber};

pub type ScriptedResponse = Result<OracleReport, OracleError>;

#[derive(Debug, Default)]
struct Script {
    /// Answers are consumed front to back; the last one repeats forever.
    responses: HashMap<OrderNumber, VecDeque<ScriptedResponse>>,
    delays: HashMap<OrderNumber, Duration>,
    default_delay: Option<Duration>,
    calls: HashMap<OrderNumber, usize>,
}

/// Accrual service double answering from a per-order script.
///
/// Orders without a script answer with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedOracle {
    script: Mutex<Script>,
    in_flight: AtomicUsize,
    max_in_flight_seen: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `status`/`accrual` for `order` from now on.
    pub fn answer(&self, order: &OrderNumber, status: OracleStatus, accrual: Option<Micros>) {
        self.script_for(
            order,
            vec![Ok(OracleReport::new(order.clone(), status, accrual))],
        );
    }

    /// Fail every call for `order` with `err`.
    pub fn fail(&self, order: &OrderNumber, err: OracleError) {
        self.script_for(order, vec![Err(err)]);
    }

    /// Replace the script for `order`.
    pub fn script_for(&self, order: &OrderNumber, responses: Vec<ScriptedResponse>) {
        self.lock()
            .responses
            .insert(order.clone(), responses.into_iter().collect());
    }

    pub fn delay_for(&self, order: &OrderNumber, delay: Duration) {
        self.lock().delays.insert(order.clone(), delay);
    }

    pub fn set_default_delay(&self, delay: Option<Duration>) {
        self.lock().default_delay = delay;
    }

    pub fn calls_for(&self, order: &OrderNumber) -> usize {
        self.lock().calls.get(order).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }

    /// Highest number of concurrent `fetch_status` calls observed.
    pub fn max_in_flight_seen(&self) -> usize {
        self.max_in_flight_seen.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn next_response(&self, order: &OrderNumber) -> (Option<Duration>, ScriptedResponse) {
        let mut s = self.lock();
        *s.calls.entry(order.clone()).or_insert(0) += 1;
        let delay = s.delays.get(order).copied().or(s.default_delay);
        let resp = match s.responses.get_mut(order) {
            Some(q) if q.len() > 1 => q.pop_front(),
            Some(q) => q.front().cloned(),
            None => None,
        };
        let resp = resp.unwrap_or_else(|| {
            Err(OracleError::Transport(format!("no scripted answer for order {order}")))
        });
        (delay, resp)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl AccrualOracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_status(&self, order: &OrderNumber) -> Result<OracleReport, OracleError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight_seen.fetch_max(now, Ordering::SeqCst);

        let (delay, resp) = self.next_response(order);
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        resp
    }
}
