//! Store trait definitions.

use crate::batch::ListCommand;
use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

/// List-valued key-value store contract.
///
/// An absent key and an empty list are indistinguishable: reads of an
/// absent key return an empty list, and a batch that empties a list removes
/// the key.
///
/// Lock keys live in their own namespace; list commands never touch them and
/// lock primitives never touch lists.
#[async_trait]
pub trait ListStore: Send + Sync + 'static {
    /// Backend name for logs (e.g. `"memory"`, `"postgres"`).
    fn name(&self) -> &'static str;

    /// Full contents of the list at `key`, head to tail.
    async fn range(&self, key: &str) -> Result<Vec<String>>;

    /// Element count; 0 when the key is absent.
    async fn len(&self, key: &str) -> Result<usize> {
        Ok(self.range(key).await?.len())
    }

    /// Element at `index`, or `None` when out of range.
    async fn get_at(&self, key: &str, index: usize) -> Result<Option<String>> {
        Ok(self.range(key).await?.into_iter().nth(index))
    }

    /// Apply `batch` to the list at `key` as one indivisible unit.
    ///
    /// Either every command is applied or none is; a rejected batch surfaces
    /// as [`BatchRejected`](crate::BatchRejected) inside the error. Returns
    /// `false` when a conditional move did not find its value.
    async fn exec(&self, key: &str, batch: &[ListCommand]) -> Result<bool>;

    /// Create `key` holding `holder` with a lifetime of `ttl`, only if the
    /// key is absent or expired. Returns `true` when created.
    async fn set_if_absent(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool>;

    /// Delete `key` only while it is held by `holder`. Returns `true` when
    /// deleted.
    async fn delete_if_holder(&self, key: &str, holder: &str) -> Result<bool>;

    async fn push_left(&self, key: &str, value: &str) -> Result<()> {
        self.exec(key, &[ListCommand::PushLeft(value.to_string())])
            .await?;
        Ok(())
    }

    async fn push_right(&self, key: &str, value: &str) -> Result<()> {
        self.exec(key, &[ListCommand::PushRight(value.to_string())])
            .await?;
        Ok(())
    }

    async fn remove_first(&self, key: &str, value: &str) -> Result<()> {
        self.exec(key, &[ListCommand::RemoveFirst(value.to_string())])
            .await?;
        Ok(())
    }

    async fn set_at(&self, key: &str, index: usize, value: &str) -> Result<()> {
        self.exec(
            key,
            &[ListCommand::SetAt {
                index,
                value: value.to_string(),
            }],
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.exec(key, &[ListCommand::Delete]).await?;
        Ok(())
    }
}
