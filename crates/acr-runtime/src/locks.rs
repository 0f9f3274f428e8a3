// In-process per-order leases. The DB row lock covers other processes.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use acr_schemas::OrderNumber;

/// Set of orders currently being reconciled in this process.
#[derive(Debug, Clone, Default)]
pub struct OrderLocks {
    held: Arc<Mutex<HashSet<OrderNumber>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` if another task already holds `order`.
    pub fn try_acquire(&self, order: &OrderNumber) -> Option<OrderLease> {
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        if !held.insert(order.clone()) {
            return None;
        }
        Some(OrderLease {
            locks: self.clone(),
            order: order.clone(),
        })
    }

    pub fn is_held(&self, order: &OrderNumber) -> bool {
        self.held
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(order)
    }

    pub fn held_count(&self) -> usize {
        self.held.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

/// Released on drop, including when the owning future is cancelled.
#[derive(Debug)]
pub struct OrderLease {
    locks: OrderLocks,
    order: OrderNumber,
}

impl OrderLease {
    pub fn order(&self) -> &OrderNumber {
        &self.order
    }
}

impl Drop for OrderLease {
    fn drop(&mut self) {
        let mut held = self.locks.held.lock().unwrap_or_else(|p| p.into_inner());
        held.remove(&self.order);
    }
}
