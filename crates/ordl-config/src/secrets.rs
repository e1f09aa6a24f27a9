//! Database connection settings.
//!
//! Config YAML stores only the **name** of the env var that holds the
//! connection URL (`store.database_url_env`). The URL itself is resolved once
//! at startup via [`StoreSettings::resolve_database_url`] and is redacted in
//! `Debug` output. Errors name the variable, never its value.

use anyhow::{bail, Result};
use serde_json::Value;

pub const DEFAULT_DATABASE_URL_ENV: &str = "ORDL_DATABASE_URL";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    /// Env var NAME holding the Postgres URL.
    pub database_url_env: String,
    pub max_connections: u32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            database_url_env: DEFAULT_DATABASE_URL_ENV.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

/// A database URL read from the environment.
/// **The value is redacted in `Debug` output.**
#[derive(Clone)]
pub struct ResolvedDatabaseUrl {
    pub env_var: String,
    pub url: String,
}

impl std::fmt::Debug for ResolvedDatabaseUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedDatabaseUrl")
            .field("env_var", &self.env_var)
            .field("url", &"<REDACTED>")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Non-empty trimmed string at `pointer`, if any.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl StoreSettings {
    /// Read `/store/*` from a loaded config, falling back to defaults.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let mut out = Self::default();
        if let Some(name) = read_str_at(config_json, "/store/database_url_env") {
            out.database_url_env = name;
        }
        if let Some(v) = config_json.pointer("/store/max_connections") {
            let Some(n) = v.as_u64() else {
                bail!("CONFIG_INVALID /store/max_connections: expected a positive integer");
            };
            if n == 0 || n > u64::from(u32::MAX) {
                bail!("CONFIG_INVALID /store/max_connections: {n} is out of range");
            }
            out.max_connections = n as u32;
        }
        Ok(out)
    }

    /// Resolve the connection URL from the configured env var.
    pub fn resolve_database_url(&self) -> Result<ResolvedDatabaseUrl> {
        match resolve_env(&self.database_url_env) {
            Some(url) => Ok(ResolvedDatabaseUrl {
                env_var: self.database_url_env.clone(),
                url,
            }),
            None => bail!(
                "DATABASE_URL_MISSING: env var '{}' is not set or empty",
                self.database_url_env
            ),
        }
    }
}
