//! Typed settings read from the merged config JSON.
//!
//! Every field has a default except `accrual.base_address`, which may come
//! from YAML or from `ACR_ACCRUAL_ADDRESS`.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LoadedConfig;

pub const ENV_ACCRUAL_ADDRESS: &str = "ACR_ACCRUAL_ADDRESS";
pub const ENV_DAEMON_ADDR: &str = "ACR_DAEMON_ADDR";
pub const DEFAULT_DB_URL_ENV: &str = "ACR_DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default)]
    pub accrual: AccrualSettings,
    #[serde(default)]
    pub reconcile: ReconcileSettings,
    #[serde(default)]
    pub db: DbSettings,
    #[serde(default)]
    pub daemon: DaemonSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualSettings {
    /// e.g. `http://localhost:8080`; `/api/orders/{number}` is appended.
    #[serde(default)]
    pub base_address: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Pause applied after a 429 that carries no usable Retry-After.
    #[serde(default = "default_rate_limit_backoff_ms")]
    pub rate_limit_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_pass_deadline_ms")]
    pub pass_deadline_ms: u64,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// Orders reconciled concurrently within one pass. 1 = sequential.
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSettings {
    /// NAME of the env var holding the connection string (never the value).
    #[serde(default = "default_db_url_env")]
    pub url_env: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_request_timeout_ms() -> u64 {
    5_000
}
fn default_rate_limit_backoff_ms() -> u64 {
    60_000
}
fn default_interval_ms() -> u64 {
    10_000
}
fn default_pass_deadline_ms() -> u64 {
    60_000
}
fn default_store_timeout_ms() -> u64 {
    5_000
}
fn default_max_in_flight() -> usize {
    4
}
fn default_db_url_env() -> String {
    DEFAULT_DB_URL_ENV.to_string()
}
fn default_max_connections() -> u32 {
    10
}
fn default_bind_addr() -> String {
    "127.0.0.1:8898".to_string()
}

impl Default for AccrualSettings {
    fn default() -> Self {
        Self {
            base_address: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            rate_limit_backoff_ms: default_rate_limit_backoff_ms(),
        }
    }
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            pass_deadline_ms: default_pass_deadline_ms(),
            store_timeout_ms: default_store_timeout_ms(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            url_env: default_db_url_env(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl ReconcilerConfig {
    /// Build from merged config JSON, apply process env overrides, validate.
    pub fn from_loaded(loaded: &LoadedConfig) -> Result<Self> {
        Self::from_json_with_env(&loaded.config_json, |name| std::env::var(name).ok())
    }

    /// Like [`ReconcilerConfig::from_loaded`] with an injectable env lookup.
    pub fn from_json_with_env<F>(config_json: &Value, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg: ReconcilerConfig =
            serde_json::from_value(config_json.clone()).context("config does not match schema")?;

        if let Some(addr) = env(ENV_ACCRUAL_ADDRESS).filter(|v| !v.trim().is_empty()) {
            cfg.accrual.base_address = addr;
        }
        if let Some(addr) = env(ENV_DAEMON_ADDR).filter(|v| !v.trim().is_empty()) {
            cfg.daemon.bind_addr = addr;
        }

        cfg.accrual.base_address = normalize_base_address(&cfg.accrual.base_address);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.accrual.base_address.is_empty() {
            bail!(
                "CONFIG_INVALID: accrual.base_address is empty; set it in YAML or via {}",
                ENV_ACCRUAL_ADDRESS
            );
        }
        if self.accrual.request_timeout_ms == 0 {
            bail!("CONFIG_INVALID: accrual.request_timeout_ms must be > 0");
        }
        if self.reconcile.interval_ms == 0 {
            bail!("CONFIG_INVALID: reconcile.interval_ms must be > 0");
        }
        if self.reconcile.pass_deadline_ms == 0 {
            bail!("CONFIG_INVALID: reconcile.pass_deadline_ms must be > 0");
        }
        if self.reconcile.store_timeout_ms == 0 {
            bail!("CONFIG_INVALID: reconcile.store_timeout_ms must be > 0");
        }
        if self.reconcile.max_in_flight == 0 {
            bail!("CONFIG_INVALID: reconcile.max_in_flight must be >= 1");
        }
        if self.db.url_env.trim().is_empty() {
            bail!("CONFIG_INVALID: db.url_env must name an env var");
        }
        if self.db.max_connections == 0 {
            bail!("CONFIG_INVALID: db.max_connections must be > 0");
        }
        self.daemon
            .bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("CONFIG_INVALID: daemon.bind_addr '{}'", self.daemon.bind_addr))?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.accrual.request_timeout_ms)
    }

    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.accrual.rate_limit_backoff_ms)
    }

    pub fn pass_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile.interval_ms)
    }

    pub fn pass_deadline(&self) -> Duration {
        Duration::from_millis(self.reconcile.pass_deadline_ms)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.reconcile.store_timeout_ms)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.daemon
            .bind_addr
            .parse()
            .with_context(|| format!("invalid bind addr '{}'", self.daemon.bind_addr))
    }
}

/// Trim whitespace and trailing slashes; default to `http://` when no scheme.
fn normalize_base_address(raw: &str) -> String {
    let t = raw.trim().trim_end_matches('/');
    if t.is_empty() {
        return String::new();
    }
    if t.starts_with("http://") || t.starts_with("https://") {
        t.to_string()
    } else {
        format!("http://{t}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = ReconcilerConfig::from_json_with_env(
            &json!({"accrual": {"base_address": "http://accrual:8080/"}}),
            no_env,
        )
        .unwrap();
        assert_eq!(cfg.accrual.base_address, "http://accrual:8080");
        assert_eq!(cfg.reconcile.max_in_flight, 4);
        assert_eq!(cfg.db.url_env, "ACR_DATABASE_URL");
        assert_eq!(cfg.pass_deadline(), Duration::from_secs(60));
    }

    #[test]
    fn env_overrides_yaml_address() {
        let cfg = ReconcilerConfig::from_json_with_env(
            &json!({"accrual": {"base_address": "http://yaml:1"}}),
            |name| (name == ENV_ACCRUAL_ADDRESS).then(|| "localhost:9090".to_string()),
        )
        .unwrap();
        assert_eq!(cfg.accrual.base_address, "http://localhost:9090");
    }

    #[test]
    fn missing_address_is_rejected() {
        let err = ReconcilerConfig::from_json_with_env(&json!({}), no_env).unwrap_err();
        assert!(err.to_string().contains("accrual.base_address"));
    }

    #[test]
    fn zero_in_flight_is_rejected() {
        let err = ReconcilerConfig::from_json_with_env(
            &json!({"accrual": {"base_address": "http://a"}, "reconcile": {"max_in_flight": 0}}),
            no_env,
        )
        .unwrap_err();
        assert!(err.to_string().contains("max_in_flight"));
    }

    #[test]
    fn bad_bind_addr_is_rejected() {
        assert!(ReconcilerConfig::from_json_with_env(
            &json!({"accrual": {"base_address": "http://a"}, "daemon": {"bind_addr": "nope"}}),
            no_env,
        )
        .is_err());
    }
}
