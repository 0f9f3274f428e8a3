// Process-wide pause on accrual service calls after a 429.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Default)]
pub struct RateGate {
    reopens_at: Mutex<Option<Instant>>,
}

impl RateGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close the gate for `pause`. Never shortens an existing pause.
    pub fn engage(&self, pause: Duration) {
        let until = Instant::now() + pause;
        let mut g = self.reopens_at.lock().unwrap_or_else(|p| p.into_inner());
        *g = Some(match *g {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    /// Instant the gate reopens, if it is closed right now.
    pub fn reopens_at(&self) -> Option<Instant> {
        let g = self.reopens_at.lock().unwrap_or_else(|p| p.into_inner());
        g.filter(|t| *t > Instant::now())
    }

    pub fn is_open(&self) -> bool {
        self.reopens_at().is_none()
    }

    /// Sleep until the gate is open. Cancel-safe.
    pub async fn wait(&self) {
        while let Some(t) = self.reopens_at() {
            tokio::time::sleep_until(t).await;
        }
    }
}
