//! Command handler modules for ordl-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod list;

use anyhow::{Context, Result};
use ordl_config::{
    load_layered_yaml, report_unused_keys, LoadedConfig, StoreSettings, UnusedKeyPolicy,
};
use ordl_store::{PgPool, PgStore};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load `--config` layers; no layers means every tunable at its default.
pub fn load_config(paths: &[String]) -> Result<LoadedConfig> {
    let loaded = if paths.is_empty() {
        LoadedConfig::empty()?
    } else {
        let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        load_layered_yaml(&path_refs)?
    };
    report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    tracing::debug!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");
    Ok(loaded)
}

/// Connect using the env var named by `store.database_url_env`.
pub async fn connect_pool(loaded: &LoadedConfig) -> Result<PgPool> {
    let settings = StoreSettings::from_config_json(&loaded.config_json)?;
    let db = settings.resolve_database_url()?;
    ordl_store::connect(&db.url, settings.max_connections)
        .await
        .with_context(|| format!("connecting via {}", db.env_var))
}

pub async fn open_store(loaded: &LoadedConfig) -> Result<PgStore> {
    Ok(PgStore::new(connect_pool(loaded).await?))
}

pub fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
