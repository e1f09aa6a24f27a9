//! PostgreSQL store backend.
//!
//! Lists live in `ordl_lists` as `text[]`; a batch runs in one transaction
//! holding the row lock, so concurrent batches on the same key serialize.
//! Locks live in `ordl_locks` with a server-side expiry.

use crate::batch::{apply_batch, ListCommand};
use crate::traits::ListStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use tracing::debug;

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ListStore for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn range(&self, key: &str) -> Result<Vec<String>> {
        let row: Option<(Vec<String>,)> =
            sqlx::query_as("select items from ordl_lists where list_key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("range failed for list '{key}'"))?;

        Ok(row.map(|(items,)| items).unwrap_or_default())
    }

    async fn len(&self, key: &str) -> Result<usize> {
        let row: Option<(i64,)> =
            sqlx::query_as("select cardinality(items)::bigint from ordl_lists where list_key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("len failed for list '{key}'"))?;

        Ok(row.map(|(n,)| n.max(0) as usize).unwrap_or(0))
    }

    async fn get_at(&self, key: &str, index: usize) -> Result<Option<String>> {
        // Postgres arrays are 1-based.
        let pg_index = index
            .checked_add(1)
            .and_then(|i| i32::try_from(i).ok())
            .with_context(|| format!("get_at index {index} out of range for list '{key}'"))?;

        let row: Option<(Option<String>,)> =
            sqlx::query_as("select items[$2] from ordl_lists where list_key = $1")
                .bind(key)
                .bind(pg_index)
                .fetch_optional(&self.pool)
                .await
                .with_context(|| format!("get_at failed for list '{key}'"))?;

        Ok(row.and_then(|(v,)| v))
    }

    async fn exec(&self, key: &str, batch: &[ListCommand]) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("exec begin transaction failed")?;

        // Make sure a row exists so FOR UPDATE has something to lock even
        // when the list is absent.
        sqlx::query(
            r#"
            insert into ordl_lists (list_key, items)
            values ($1, '{}')
            on conflict (list_key) do nothing
            "#,
        )
        .bind(key)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("exec seed row failed for list '{key}'"))?;

        let (mut items,): (Vec<String>,) =
            sqlx::query_as("select items from ordl_lists where list_key = $1 for update")
                .bind(key)
                .fetch_one(&mut *tx)
                .await
                .with_context(|| format!("exec row lock failed for list '{key}'"))?;

        // A rejected batch drops `tx`, which rolls back.
        let applied = apply_batch(key, &mut items, batch)?;

        if items.is_empty() {
            sqlx::query("delete from ordl_lists where list_key = $1")
                .bind(key)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("exec delete failed for list '{key}'"))?;
        } else {
            sqlx::query(
                r#"
                update ordl_lists
                set items = $2,
                    updated_at = now()
                where list_key = $1
                "#,
            )
            .bind(key)
            .bind(&items)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("exec update failed for list '{key}'"))?;
        }

        tx.commit().await.context("exec commit failed")?;
        debug!(list_key = key, commands = batch.len(), applied, "postgres batch committed");
        Ok(applied)
    }

    async fn set_if_absent(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let ttl_ms = ttl.as_millis() as f64;

        let res = sqlx::query(
            r#"
            insert into ordl_locks (lock_key, holder, expires_at)
            values ($1, $2, now() + ($3::double precision * interval '1 millisecond'))
            on conflict (lock_key) do update
              set holder = excluded.holder,
                  expires_at = excluded.expires_at
              where ordl_locks.expires_at <= now()
            "#,
        )
        .bind(key)
        .bind(holder)
        .bind(ttl_ms)
        .execute(&self.pool)
        .await
        .with_context(|| format!("set_if_absent failed for lock '{key}'"))?;

        Ok(res.rows_affected() == 1)
    }

    async fn delete_if_holder(&self, key: &str, holder: &str) -> Result<bool> {
        // An expired row is not held by anyone, even if nobody took it over yet.
        let res = sqlx::query(
            "delete from ordl_locks where lock_key = $1 and holder = $2 and expires_at > now()",
        )
        .bind(key)
        .bind(holder)
        .execute(&self.pool)
        .await
        .with_context(|| format!("delete_if_holder failed for lock '{key}'"))?;

        Ok(res.rows_affected() > 0)
    }
}
