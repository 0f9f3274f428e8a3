use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

mod ledger;

pub use ledger::{
    commit_terminal, credit_balance, credit_for_order, fetch_balance, fetch_order, insert_order,
    list_pending_orders, lock_order, set_order_status, CommitError, CommitStage, CreditRow,
    NewOrder, OrderRow, TerminalCommitOutcome,
};

pub const ENV_DB_URL: &str = "ACR_DATABASE_URL";

/// Connect to Postgres using ACR_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, 10).await
}

/// Connect with an explicit URL (resolved from config secrets by callers).
pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Simple status query (connectivity + schema presence).
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;
    let ok = one == 1;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='orders'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok,
        has_orders_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_orders_table: bool,
}

/// Count orders still awaiting a terminal decision.
pub async fn count_pending_orders(pool: &PgPool) -> Result<i64> {
    let st = status(pool).await?;
    if !st.has_orders_table {
        return Ok(0);
    }

    let (n,): (i64,) = sqlx::query_as::<_, (i64,)>(
        r#"
        select count(*)::bigint
        from orders
        where status in ('NEW','PROCESSING')
        "#,
    )
    .fetch_one(pool)
    .await
    .context("count_pending_orders failed")?;

    Ok(n)
}
