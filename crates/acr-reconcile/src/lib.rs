//! acr-reconcile
//!
//! Order status state machine.
//!
//! Given the accrual service's answer for one pending order, decide whether
//! the order moves to a terminal status (and whether a balance credit
//! follows) or stays pending.
//!
//! - `PROCESSED` => commit PROCESSED with the reported accrual; credit if > 0
//! - `INVALID`   => commit INVALID; accrual ignored; never credits
//! - anything else (REGISTERED, PROCESSING, not registered, unknown) => hold
//!
//! Deterministic, pure logic. No IO. No store or HTTP calls.

mod engine;
mod types;

pub use engine::decide;
pub use types::*;
