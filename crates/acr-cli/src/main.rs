use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use acr_config::{ConfigConsumer, ReconcilerConfig, UnusedKeyPolicy};
use acr_oracle::HttpAccrualOracle;
use acr_runtime::{OutcomeKind, PassReport, PassStatus, PgLedgerStore, ReconcileWorker, WorkerConfig};
use acr_schemas::{OrderNumber, UserId};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

#[derive(Parser)]
#[command(name = "acr")]
#[command(about = "Accrual reconciler CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands (uses ACR_DATABASE_URL)
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Reconciliation passes
    Reconcile {
        #[command(subcommand)]
        cmd: ReconcileCmd,
    },

    /// Order inspection (uses ACR_DATABASE_URL)
    Orders {
        #[command(subcommand)]
        cmd: OrdersCmd,
    },

    /// Balance inspection (uses ACR_DATABASE_URL)
    Balance {
        #[command(subcommand)]
        cmd: BalanceCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply SQL migrations
    Migrate,
}

#[derive(Subcommand)]
enum ReconcileCmd {
    /// Run exactly one pass and print its report
    Once {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Override the configured pass deadline
        #[arg(long)]
        deadline_ms: Option<u64>,

        /// Print the full report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum OrdersCmd {
    /// List orders awaiting a terminal status, oldest first
    Pending,
    /// Print one order row
    Show {
        #[arg(long)]
        number: String,
    },
}

#[derive(Subcommand)]
enum BalanceCmd {
    Show {
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => {
            let pool = acr_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = acr_db::status(&pool).await?;
                    let pending = acr_db::count_pending_orders(&pool).await?;
                    println!(
                        "db_ok={} has_orders_table={} pending_orders={}",
                        s.ok, s.has_orders_table, pending
                    );
                }
                DbCmd::Migrate => {
                    acr_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = acr_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Reconcile { cmd } => match cmd {
            ReconcileCmd::Once {
                config_paths,
                deadline_ms,
                json,
            } => {
                if deadline_ms == Some(0) {
                    anyhow::bail!("--deadline-ms must be > 0");
                }
                let (config_hash, report) =
                    reconcile_once(&config_paths, deadline_ms.map(Duration::from_millis)).await?;
                print!("{}", render_report(&config_hash, &report, json)?);
                if report.status == PassStatus::ListingFailed {
                    anyhow::bail!(
                        "pass {} failed: {}",
                        report.pass_id,
                        report.error.as_deref().unwrap_or("listing failed")
                    );
                }
            }
        },

        Commands::Orders { cmd } => match cmd {
            OrdersCmd::Pending => {
                let pool = acr_db::connect_from_env().await?;
                let pending = acr_db::list_pending_orders(&pool).await?;
                for n in &pending {
                    println!("{}", n);
                }
                println!("pending_count={}", pending.len());
            }
            OrdersCmd::Show { number } => {
                let number = OrderNumber::parse(&number).context("invalid --number")?;
                let pool = acr_db::connect_from_env().await?;
                let row = acr_db::fetch_order(&pool, &number)
                    .await?
                    .with_context(|| format!("order {number} not found"))?;
                println!("order_number={}", row.order_number);
                println!("user_id={}", row.user_id);
                println!("status={}", row.status);
                println!("accrual={}", opt(row.accrual.map(|a| a.to_string())));
                println!("uploaded_at_utc={}", row.uploaded_at_utc.to_rfc3339());
                println!("updated_at_utc={}", opt(row.updated_at_utc.map(|t| t.to_rfc3339())));
                if let Some(c) = acr_db::credit_for_order(&pool, &number).await? {
                    println!("credited={} credited_at_utc={}", c.amount, c.credited_at_utc.to_rfc3339());
                }
            }
        },

        Commands::Balance { cmd } => match cmd {
            BalanceCmd::Show { user } => {
                let user = UserId::new(user);
                let pool = acr_db::connect_from_env().await?;
                let bal = acr_db::fetch_balance(&pool, &user).await?;
                println!("user_id={} balance={}", user, bal);
            }
        },
    }

    Ok(())
}

async fn reconcile_once(
    config_paths: &[String],
    deadline: Option<Duration>,
) -> Result<(String, PassReport)> {
    let path_refs: Vec<&str> = config_paths.iter().map(|s| s.as_str()).collect();
    let loaded = acr_config::load_layered_yaml(&path_refs)?;

    let unused = acr_config::report_unused_keys(ConfigConsumer::Cli, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    for key in &unused.unused_leaf_pointers {
        warn!(key = %key, "config key is not read by the CLI");
    }

    let cfg = ReconcilerConfig::from_loaded(&loaded)?;
    let secrets = acr_config::resolve_secrets(&cfg);
    let pool = acr_db::connect(secrets.require_database_url()?, cfg.db.max_connections).await?;

    let oracle = HttpAccrualOracle::new(&cfg.accrual.base_address, cfg.request_timeout())
        .context("build accrual client")?;
    let worker = ReconcileWorker::new(
        Arc::new(PgLedgerStore::new(pool)),
        Arc::new(oracle),
        WorkerConfig::from_config(&cfg),
    );

    let report = worker.run_pass(deadline).await;
    Ok((loaded.config_hash, report))
}

/// Stdout for `reconcile once`. JSON mode emits the report document alone.
fn render_report(config_hash: &str, r: &PassReport, json: bool) -> Result<String> {
    if json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(r)?));
    }

    let mut out = String::new();
    writeln!(out, "config_hash={}", config_hash)?;
    writeln!(out, "pass_id={}", r.pass_id)?;
    writeln!(out, "status={:?}", r.status)?;
    if let Some(e) = &r.error {
        writeln!(out, "error={}", e)?;
    }
    writeln!(
        out,
        "listed={} committed={} held={} failed={} skipped={} abandoned={} credited_total={}",
        r.listed, r.committed, r.held, r.failed, r.skipped, r.abandoned, r.credited_total
    )?;
    for o in &r.outcomes {
        match &o.kind {
            OutcomeKind::Committed {
                status,
                owner,
                applied,
                credited,
            } => writeln!(
                out,
                "order={} outcome=COMMITTED status={} owner={} applied={} credited={}",
                o.order,
                status,
                owner,
                applied,
                opt(credited.map(|c| c.to_string()))
            )?,
            OutcomeKind::Held { observed } => {
                writeln!(out, "order={} outcome=HELD observed={}", o.order, observed)?
            }
            OutcomeKind::Failed { kind, error } => writeln!(
                out,
                "order={} outcome=FAILED kind={:?} error={}",
                o.order, kind, error
            )?,
            OutcomeKind::Skipped => writeln!(out, "order={} outcome=SKIPPED", o.order)?,
        }
    }
    Ok(out)
}

fn opt(v: Option<String>) -> String {
    v.unwrap_or_else(|| "NULL".to_string())
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_report() -> PassReport {
        serde_json::from_value(json!({
            "pass_id": "6f1c2b1e-3a4d-4c5e-8f90-123456789abc",
            "started_at_utc": "2026-01-01T00:00:00Z",
            "finished_at_utc": "2026-01-01T00:00:01Z",
            "status": "COMPLETED",
            "error": null,
            "listed": 1,
            "committed": 0,
            "held": 1,
            "failed": 0,
            "skipped": 0,
            "abandoned": 0,
            "credited_total": 0,
            "outcomes": [{"order": "200", "outcome": "HELD", "observed": "PROCESSING"}]
        }))
        .unwrap()
    }

    #[test]
    fn json_output_is_a_single_document() {
        let report = sample_report();
        let out = render_report("abc123", &report, true).unwrap();
        assert!(!out.contains("config_hash"), "{out}");
        let parsed: PassReport = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn text_output_leads_with_config_hash() {
        let out = render_report("abc123", &sample_report(), false).unwrap();
        assert!(out.starts_with("config_hash=abc123\n"), "{out}");
        assert!(out.contains("order=200 outcome=HELD observed=PROCESSING"), "{out}");
    }
}
