//! ordl-store
//!
//! Key-value list storage underneath the ordered-list engine.
//!
//! Responsibilities:
//! - The [`ListStore`] contract: list primitives (push-left/right,
//!   remove-first-match, length, get-at, range), an atomic batch of
//!   [`ListCommand`]s per key, and the two lock-key primitives
//!   (create-if-absent with expiry, holder-checked delete).
//! - Backends: [`MemoryStore`] (in-process) and [`PgStore`] (PostgreSQL).
//! - Connection bootstrap and embedded migrations for the PostgreSQL backend.
//!
//! The store knows nothing about sentinels, ids or ordering policy; it only
//! moves strings around under a key.

pub mod backends;
pub mod batch;
pub mod traits;

pub use backends::{memory::MemoryStore, postgres::PgStore};
pub use batch::{apply_batch, BatchRejected, ListCommand};
pub use traits::ListStore;

pub use sqlx::PgPool;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

pub const ENV_DB_URL: &str = "ORDL_DATABASE_URL";

/// Connect to Postgres using ORDL_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    connect_from_env_var(ENV_DB_URL, 10).await
}

/// Connect to Postgres using the URL held in `env_var`.
pub async fn connect_from_env_var(env_var: &str, max_connections: u32) -> Result<PgPool> {
    let url = std::env::var(env_var).with_context(|| format!("missing env var {env_var}"))?;
    connect(&url, max_connections).await
}

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
            where table_schema='public' and table_name='ordl_lists'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    let list_count = if exists {
        let (n,): (i64,) = sqlx::query_as::<_, (i64,)>("select count(*)::bigint from ordl_lists")
            .fetch_one(pool)
            .await
            .context("status list count query failed")?;
        n
    } else {
        0
    };

    Ok(DbStatus {
        ok,
        has_lists_table: exists,
        list_count,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_lists_table: bool,
    pub list_count: i64,
}
