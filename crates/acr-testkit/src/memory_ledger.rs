use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use acr_reconcile::LedgerCommit;
use acr_runtime::{CommitReceipt, LedgerStore, StoreError};
use acr_schemas::{Micros, OrderNumber, OrderStatus, UserId};

#[derive(Debug, Clone)]
struct MemOrder {
    owner: UserId,
    status: OrderStatus,
    accrual: Option<Micros>,
    /// Insertion sequence; stands in for `uploaded_at_utc`.
    seq: u64,
}

#[derive(Debug, Default)]
struct LedgerState {
    orders: BTreeMap<OrderNumber, MemOrder>,
    next_seq: u64,
    balances: HashMap<UserId, Micros>,
    credits: HashSet<OrderNumber>,
    credit_events: u64,
    commit_calls: u64,
}

#[derive(Debug, Default)]
struct Faults {
    fail_listing: bool,
    status_write_failures: HashMap<OrderNumber, u32>,
    credit_failures: HashMap<OrderNumber, u32>,
    commit_delay: Option<Duration>,
}

/// In-memory order ledger.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    faults: Mutex<Faults>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a NEW order owned by `owner`.
    pub fn insert_order(&self, number: &OrderNumber, owner: &str) {
        let mut st = self.state();
        let seq = st.next_seq;
        st.next_seq += 1;
        st.orders.insert(
            number.clone(),
            MemOrder {
                owner: UserId::new(owner),
                status: OrderStatus::New,
                accrual: None,
                seq,
            },
        );
    }

    pub fn status_of(&self, number: &OrderNumber) -> Option<OrderStatus> {
        self.state().orders.get(number).map(|o| o.status)
    }

    pub fn accrual_of(&self, number: &OrderNumber) -> Option<Micros> {
        self.state().orders.get(number).and_then(|o| o.accrual)
    }

    pub fn balance_of(&self, owner: &str) -> Micros {
        self.state()
            .balances
            .get(&UserId::new(owner))
            .copied()
            .unwrap_or(Micros::ZERO)
    }

    /// Total credits ever applied, across all orders.
    pub fn credit_events(&self) -> u64 {
        self.state().credit_events
    }

    pub fn commit_calls(&self) -> u64 {
        self.state().commit_calls
    }

    pub fn pending(&self) -> Vec<OrderNumber> {
        pending_in_order(&self.state())
    }

    // --- faults -----------------------------------------------------------

    pub fn fail_listing(&self, on: bool) {
        self.faults().fail_listing = on;
    }

    /// The next `times` commits for `number` fail at the status write.
    pub fn fail_status_write(&self, number: &OrderNumber, times: u32) {
        self.faults()
            .status_write_failures
            .insert(number.clone(), times);
    }

    /// The next `times` commits for `number` fail at the credit step.
    pub fn fail_credit(&self, number: &OrderNumber, times: u32) {
        self.faults().credit_failures.insert(number.clone(), times);
    }

    /// Every commit sleeps this long before touching state.
    pub fn set_commit_delay(&self, delay: Option<Duration>) {
        self.faults().commit_delay = delay;
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn take_fault(map: &mut HashMap<OrderNumber, u32>, number: &OrderNumber) -> bool {
        match map.get_mut(number) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

fn pending_in_order(st: &LedgerState) -> Vec<OrderNumber> {
    let mut pending: Vec<(&OrderNumber, &MemOrder)> = st
        .orders
        .iter()
        .filter(|(_, o)| !o.status.is_terminal())
        .collect();
    pending.sort_by(|a, b| a.1.seq.cmp(&b.1.seq).then_with(|| a.0.cmp(b.0)));
    pending.into_iter().map(|(n, _)| n.clone()).collect()
}

#[async_trait::async_trait]
impl LedgerStore for MemoryLedger {
    async fn list_pending_orders(&self) -> Result<Vec<OrderNumber>, StoreError> {
        if self.faults().fail_listing {
            return Err(StoreError::Listing("injected listing failure".to_string()));
        }
        Ok(self.pending())
    }

    async fn commit(&self, commit: &LedgerCommit) -> Result<CommitReceipt, StoreError> {
        let delay = self.faults().commit_delay;
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }

        let number = commit.order();
        let (fail_status, fail_credit) = {
            let mut f = self.faults();
            let s = Self::take_fault(&mut f.status_write_failures, number);
            let c = !s && Self::take_fault(&mut f.credit_failures, number);
            (s, c)
        };

        let mut st = self.state();
        st.commit_calls += 1;

        let Some(order) = st.orders.get(number).cloned() else {
            return Err(StoreError::StatusWrite(format!("order {number} not found")));
        };

        if order.status.is_terminal() {
            return Ok(CommitReceipt {
                owner: order.owner,
                applied: false,
                credited: None,
            });
        }

        if fail_status {
            return Err(StoreError::StatusWrite("injected status write failure".to_string()));
        }

        let credit = commit
            .credit()
            .filter(|_| !st.credits.contains(number));

        // Nothing is mutated before this point: a credit failure leaves the
        // order exactly as it was.
        if credit.is_some() && fail_credit {
            return Err(StoreError::Credit("injected credit failure".to_string()));
        }

        if let Some(o) = st.orders.get_mut(number) {
            o.status = commit.status();
            o.accrual = commit.accrual();
        }
        if let Some(amount) = credit {
            st.credits.insert(number.clone());
            st.credit_events += 1;
            let bal = st.balances.entry(order.owner.clone()).or_insert(Micros::ZERO);
            *bal = bal.saturating_add(amount);
        }

        Ok(CommitReceipt {
            owner: order.owner,
            applied: true,
            credited: credit,
        })
    }
}
