use std::fmt;

use acr_db::{CommitError, CommitStage};
use acr_reconcile::LedgerCommit;
use acr_schemas::{Micros, OrderNumber, UserId};
use sqlx::PgPool;

use crate::FailureKind;

// ---------------------------------------------------------------------------
// Seam
// ---------------------------------------------------------------------------

/// What the ledger reports back after a terminal commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub owner: UserId,
    /// `false` when the order was already terminal (replay; nothing written).
    pub applied: bool,
    pub credited: Option<Micros>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Listing(String),
    /// Status write failed; nothing was committed.
    StatusWrite(String),
    /// Credit failed; the status write was rolled back with it.
    Credit(String),
}

impl StoreError {
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            StoreError::Listing(_) => FailureKind::ListingFailure,
            StoreError::StatusWrite(_) => FailureKind::StatusWrite,
            StoreError::Credit(_) => FailureKind::Credit,
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Listing(msg) => write!(f, "pending order listing failed: {msg}"),
            StoreError::StatusWrite(msg) => write!(f, "status write failed: {msg}"),
            StoreError::Credit(msg) => write!(f, "balance credit failed: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persistent order ledger as the worker sees it.
///
/// `commit` must apply the status write and the credit atomically, and must
/// never credit the same order twice.
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn list_pending_orders(&self) -> Result<Vec<OrderNumber>, StoreError>;

    async fn commit(&self, commit: &LedgerCommit) -> Result<CommitReceipt, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl LedgerStore for PgLedgerStore {
    async fn list_pending_orders(&self) -> Result<Vec<OrderNumber>, StoreError> {
        acr_db::list_pending_orders(&self.pool)
            .await
            .map_err(|e| StoreError::Listing(format!("{e:#}")))
    }

    async fn commit(&self, commit: &LedgerCommit) -> Result<CommitReceipt, StoreError> {
        let out = acr_db::commit_terminal(&self.pool, commit.order(), commit.status(), commit.accrual())
            .await
            .map_err(store_error_from_commit)?;

        Ok(CommitReceipt {
            owner: out.owner,
            applied: out.applied,
            credited: out.credited,
        })
    }
}

fn store_error_from_commit(e: CommitError) -> StoreError {
    match e.stage() {
        CommitStage::Credit => StoreError::Credit(e.to_string()),
        CommitStage::Begin | CommitStage::Lock | CommitStage::StatusWrite | CommitStage::Commit => {
            StoreError::StatusWrite(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acr_schemas::OrderStatus;

    #[test]
    fn credit_stage_maps_to_credit_failure() {
        let e = CommitError::Db {
            stage: CommitStage::Credit,
            source: sqlx::Error::PoolTimedOut,
        };
        assert_eq!(store_error_from_commit(e).failure_kind(), FailureKind::Credit);
    }

    #[test]
    fn other_stages_map_to_status_write_failure() {
        for stage in [CommitStage::Begin, CommitStage::Lock, CommitStage::StatusWrite, CommitStage::Commit] {
            let e = CommitError::Db {
                stage,
                source: sqlx::Error::PoolTimedOut,
            };
            assert_eq!(store_error_from_commit(e).failure_kind(), FailureKind::StatusWrite);
        }
        let e = CommitError::NotTerminal(OrderStatus::New);
        assert_eq!(store_error_from_commit(e).failure_kind(), FailureKind::StatusWrite);
    }
}
