// Order ledger + user balances.
//
// Design notes:
// - Money is stored as bigint micros; no floats cross the SQL boundary.
// - A terminal status write and its balance credit commit in ONE transaction.
//   Either both land or neither does; a failed commit leaves the order pending.
// - `accrual_credits` is keyed by order_number, so a credit can be recorded at
//   most once per order even if a terminal write is replayed.
// - The order row is locked (`for update`) for the whole transaction, which
//   serializes concurrent commits for the same order across processes.

use std::fmt;

use acr_schemas::{Micros, OrderNumber, OrderStatus, UserId};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row};

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Order row as uploaded by the (external) order intake path.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRow {
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub accrual: Option<Micros>,
    pub uploaded_at_utc: DateTime<Utc>,
    pub updated_at_utc: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditRow {
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub amount: Micros,
    pub credited_at_utc: DateTime<Utc>,
}

/// Result of [`commit_terminal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalCommitOutcome {
    pub owner: UserId,
    /// Status on the row after the call.
    pub status: OrderStatus,
    /// `false` when the order was already terminal and nothing was written.
    pub applied: bool,
    /// Amount credited by THIS call (never set on replays).
    pub credited: Option<Micros>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Step of the terminal-commit transaction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStage {
    Begin,
    Lock,
    StatusWrite,
    Credit,
    Commit,
}

impl CommitStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStage::Begin => "begin",
            CommitStage::Lock => "lock",
            CommitStage::StatusWrite => "status_write",
            CommitStage::Credit => "credit",
            CommitStage::Commit => "commit",
        }
    }
}

#[derive(Debug)]
pub enum CommitError {
    OrderNotFound(OrderNumber),
    NotTerminal(OrderStatus),
    Db {
        stage: CommitStage,
        source: sqlx::Error,
    },
}

impl CommitError {
    fn db(stage: CommitStage) -> impl FnOnce(sqlx::Error) -> CommitError {
        move |source| CommitError::Db { stage, source }
    }

    /// Stage the failure belongs to. Lookup/validation failures count as
    /// status-write failures: nothing was credited.
    pub fn stage(&self) -> CommitStage {
        match self {
            CommitError::OrderNotFound(_) | CommitError::NotTerminal(_) => CommitStage::StatusWrite,
            CommitError::Db { stage, .. } => *stage,
        }
    }
}

impl fmt::Display for CommitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitError::OrderNotFound(n) => write!(f, "order {n} not found"),
            CommitError::NotTerminal(s) => write!(f, "refusing terminal commit with status {s}"),
            CommitError::Db { stage, source } => {
                write!(f, "terminal commit failed at {}: {source}", stage.as_str())
            }
        }
    }
}

impl std::error::Error for CommitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommitError::Db { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Orders not yet terminal, oldest upload first (ties broken by number).
pub async fn list_pending_orders(pool: &PgPool) -> Result<Vec<OrderNumber>> {
    let rows = sqlx::query(
        r#"
        select order_number
        from orders
        where status in ('NEW','PROCESSING')
        order by uploaded_at_utc asc, order_number asc
        "#,
    )
    .fetch_all(pool)
    .await
    .context("list_pending_orders failed")?;

    rows.iter()
        .map(|r| {
            let raw: String = r.try_get("order_number")?;
            OrderNumber::parse(&raw).map_err(|e| anyhow!("corrupt order_number in ledger: {e}"))
        })
        .collect()
}

pub async fn fetch_order(pool: &PgPool, number: &OrderNumber) -> Result<Option<OrderRow>> {
    let row = sqlx::query(
        r#"
        select order_number, user_id, status, accrual_micros, uploaded_at_utc, updated_at_utc
        from orders
        where order_number = $1
        "#,
    )
    .bind(number.as_str())
    .fetch_optional(pool)
    .await
    .context("fetch_order failed")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let status: String = row.try_get("status")?;
    let accrual: Option<i64> = row.try_get("accrual_micros")?;
    Ok(Some(OrderRow {
        order_number: number.clone(),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        status: OrderStatus::parse(&status)?,
        accrual: accrual.map(Micros::new),
        uploaded_at_utc: row.try_get("uploaded_at_utc")?,
        updated_at_utc: row.try_get("updated_at_utc")?,
    }))
}

/// Current balance; zero for a user that was never credited.
pub async fn fetch_balance(pool: &PgPool, user: &UserId) -> Result<Micros> {
    let row: Option<(i64,)> =
        sqlx::query_as::<_, (i64,)>("select balance_micros from user_balances where user_id = $1")
            .bind(user.as_str())
            .fetch_optional(pool)
            .await
            .context("fetch_balance failed")?;

    Ok(row.map(|(b,)| Micros::new(b)).unwrap_or(Micros::ZERO))
}

pub async fn credit_for_order(pool: &PgPool, number: &OrderNumber) -> Result<Option<CreditRow>> {
    let row = sqlx::query(
        r#"
        select user_id, amount_micros, credited_at_utc
        from accrual_credits
        where order_number = $1
        "#,
    )
    .bind(number.as_str())
    .fetch_optional(pool)
    .await
    .context("credit_for_order failed")?;

    let Some(row) = row else {
        return Ok(None);
    };

    Ok(Some(CreditRow {
        order_number: number.clone(),
        user_id: UserId::new(row.try_get::<String, _>("user_id")?),
        amount: Micros::new(row.try_get("amount_micros")?),
        credited_at_utc: row.try_get("credited_at_utc")?,
    }))
}

// ---------------------------------------------------------------------------
// Writes
// ---------------------------------------------------------------------------

/// Insert a NEW order. Order intake lives upstream; fixtures use this too.
pub async fn insert_order(pool: &PgPool, order: &NewOrder) -> Result<()> {
    sqlx::query(
        r#"
        insert into orders (order_number, user_id, status)
        values ($1, $2, 'NEW')
        "#,
    )
    .bind(order.order_number.as_str())
    .bind(order.user_id.as_str())
    .execute(pool)
    .await
    .context("insert_order failed")?;

    Ok(())
}

/// Lock an order row for the rest of the transaction.
/// Returns `(owner, current status)` or `None` if the order does not exist.
pub async fn lock_order(
    conn: &mut PgConnection,
    number: &OrderNumber,
) -> Result<Option<(UserId, OrderStatus)>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        select user_id, status
        from orders
        where order_number = $1
        for update
        "#,
    )
    .bind(number.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let owner: String = row.try_get("user_id")?;
    let status: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(Some((UserId::new(owner), status)))
}

/// Move a pending order to `status`. Returns the owner, or `None` when the
/// order is missing or already terminal (terminal rows never change).
pub async fn set_order_status(
    conn: &mut PgConnection,
    number: &OrderNumber,
    status: OrderStatus,
    accrual: Option<Micros>,
) -> Result<Option<UserId>, sqlx::Error> {
    let accrual = match status {
        OrderStatus::Processed => accrual.map(Micros::raw),
        _ => None,
    };

    let owner: Option<(String,)> = sqlx::query_as::<_, (String,)>(
        r#"
        update orders
        set status = $2,
            accrual_micros = $3,
            updated_at_utc = now()
        where order_number = $1
          and status in ('NEW','PROCESSING')
        returning user_id
        "#,
    )
    .bind(number.as_str())
    .bind(status.as_str())
    .bind(accrual)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(owner.map(|(u,)| UserId::new(u)))
}

/// Credit `amount` to `owner` for `number`, at most once per order.
///
/// Returns `true` if this call credited, `false` if a credit for the order
/// already existed (balance untouched).
pub async fn credit_balance(
    conn: &mut PgConnection,
    number: &OrderNumber,
    owner: &UserId,
    amount: Micros,
) -> Result<bool, sqlx::Error> {
    let inserted = sqlx::query(
        r#"
        insert into accrual_credits (order_number, user_id, amount_micros)
        values ($1, $2, $3)
        on conflict (order_number) do nothing
        "#,
    )
    .bind(number.as_str())
    .bind(owner.as_str())
    .bind(amount.raw())
    .execute(&mut *conn)
    .await?
    .rows_affected()
        == 1;

    if !inserted {
        return Ok(false);
    }

    sqlx::query(
        r#"
        insert into user_balances (user_id, balance_micros, updated_at_utc)
        values ($1, $2, now())
        on conflict (user_id) do update
        set balance_micros = user_balances.balance_micros + excluded.balance_micros,
            updated_at_utc = now()
        "#,
    )
    .bind(owner.as_str())
    .bind(amount.raw())
    .execute(&mut *conn)
    .await?;

    Ok(true)
}

/// Apply a terminal transition and its credit atomically.
///
/// - order missing => `OrderNotFound`
/// - order already terminal => `applied = false`, nothing written
/// - PROCESSED with positive accrual => status write + one-time credit
/// - INVALID => status write only; any accrual is dropped
pub async fn commit_terminal(
    pool: &PgPool,
    number: &OrderNumber,
    status: OrderStatus,
    accrual: Option<Micros>,
) -> Result<TerminalCommitOutcome, CommitError> {
    if !status.is_terminal() {
        return Err(CommitError::NotTerminal(status));
    }

    let mut tx = pool.begin().await.map_err(CommitError::db(CommitStage::Begin))?;

    let Some((owner, current)) = lock_order(&mut *tx, number)
        .await
        .map_err(CommitError::db(CommitStage::Lock))?
    else {
        return Err(CommitError::OrderNotFound(number.clone()));
    };

    if current.is_terminal() {
        // Dropping the transaction releases the row lock.
        return Ok(TerminalCommitOutcome {
            owner,
            status: current,
            applied: false,
            credited: None,
        });
    }

    set_order_status(&mut *tx, number, status, accrual)
        .await
        .map_err(CommitError::db(CommitStage::StatusWrite))?
        .ok_or_else(|| CommitError::Db {
            stage: CommitStage::StatusWrite,
            source: sqlx::Error::RowNotFound,
        })?;

    let credit = match status {
        OrderStatus::Processed => accrual.filter(|a| a.is_positive()),
        _ => None,
    };

    let credited = match credit {
        Some(amount) => credit_balance(&mut *tx, number, &owner, amount)
            .await
            .map_err(CommitError::db(CommitStage::Credit))?
            .then_some(amount),
        None => None,
    };

    tx.commit().await.map_err(CommitError::db(CommitStage::Commit))?;

    Ok(TerminalCommitOutcome {
        owner,
        status,
        applied: true,
        credited,
    })
}
