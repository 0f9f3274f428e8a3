//! acr-daemon entry point.
//!
//! Loads config, connects the ledger, builds the worker, starts the
//! periodic pass loop and serves the control plane. Handlers live in
//! `routes.rs`; shared state in `state.rs`.

use std::{sync::Arc, time::Duration};

use acr_config::{ConfigConsumer, ReconcilerConfig, UnusedKeyPolicy};
use acr_oracle::HttpAccrualOracle;
use acr_runtime::{PgLedgerStore, ReconcileWorker, WorkerConfig};
use acr_daemon::{routes, state};
use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_CONFIG_PATHS: &str = "ACR_CONFIG_PATHS";
const DEFAULT_CONFIG_PATH: &str = "config/base.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = acr_config::load_layered_yaml(&path_refs).context("load config")?;

    let unused = acr_config::report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    for key in &unused.unused_leaf_pointers {
        warn!(key = %key, "config key is not read by the daemon");
    }

    let cfg = ReconcilerConfig::from_loaded(&loaded)?;
    let secrets = acr_config::resolve_secrets(&cfg);
    info!(
        config_hash = %loaded.config_hash,
        accrual = %cfg.accrual.base_address,
        "config loaded"
    );

    let pool = acr_db::connect(secrets.require_database_url()?, cfg.db.max_connections).await?;
    acr_db::migrate(&pool).await?;

    let oracle = HttpAccrualOracle::new(&cfg.accrual.base_address, cfg.request_timeout())
        .context("build accrual client")?;

    let worker = Arc::new(ReconcileWorker::new(
        Arc::new(PgLedgerStore::new(pool)),
        Arc::new(oracle),
        WorkerConfig::from_config(&cfg),
    ));

    let shared = Arc::new(state::AppState::new(worker));

    let heartbeat = state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    let passes = state::spawn_periodic_passes(Arc::clone(&shared), cfg.pass_interval());

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = cfg.bind_addr()?;
    info!("acr-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    // In-flight pass is dropped here; open DB transactions roll back.
    passes.abort();
    heartbeat.abort();
    info!("acr-daemon stopped");

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Comma-separated list, later files override earlier ones.
fn config_paths_from_env() -> Vec<String> {
    std::env::var(ENV_CONFIG_PATHS)
        .ok()
        .map(|v| {
            v.split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_CONFIG_PATH.to_string()])
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl_c handler failed; shutting down");
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
