//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only env var NAMES (e.g. `db.url_env: ACR_DATABASE_URL`).
//! - Binaries call [`resolve_secrets`] once at startup and pass the result
//!   into constructors; `std::env::var` for secrets is not read elsewhere.
//! - `Debug` redacts values. Errors name the env var, never the value.

use anyhow::{bail, Result};

use crate::ReconcilerConfig;

#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Name of the env var the URL was read from (safe to log).
    pub database_url_env: String,
    /// `None` if the named env var was absent or blank.
    pub database_url: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("database_url_env", &self.database_url_env)
            .field("database_url", &self.database_url.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ResolvedSecrets {
    /// The database URL, or an error naming the env var that must be set.
    pub fn require_database_url(&self) -> Result<&str> {
        match self.database_url.as_deref() {
            Some(url) => Ok(url),
            None => bail!(
                "SECRETS_MISSING: required env var '{}' (database url) is not set or empty",
                self.database_url_env
            ),
        }
    }
}

/// Resolve secrets from the process environment.
pub fn resolve_secrets(cfg: &ReconcilerConfig) -> ResolvedSecrets {
    resolve_secrets_with(cfg, |name| std::env::var(name).ok())
}

/// Resolve secrets through an injectable lookup (tests pass a closure).
pub fn resolve_secrets_with<F>(cfg: &ReconcilerConfig, env: F) -> ResolvedSecrets
where
    F: Fn(&str) -> Option<String>,
{
    let name = cfg.db.url_env.trim().to_string();
    let database_url = env(&name).filter(|v| !v.trim().is_empty());
    ResolvedSecrets {
        database_url_env: name,
        database_url,
    }
}
