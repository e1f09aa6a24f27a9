//! One ordered list of integer ids stored under a single key.
//!
//! Stored representation: decimal ids head to tail, followed by exactly one
//! sentinel element. The sentinel marks the list as initialized, which keeps
//! "never set up" apart from "set up but empty" on stores where an empty list
//! and an absent key look the same. Callers never see the sentinel; they get
//! [`ListState`] instead.
//!
//! Inserting operations establish the sentinel in the same batch, so the
//! first insert against an absent key initializes the list. `remove` and
//! moves of absent ids never do.

use crate::lock::DistributedLock;
use crate::settings::ListSettings;
use anyhow::{Context, Result};
use ordl_store::{ListCommand, ListStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Observable state of a list key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "ids", rename_all = "snake_case")]
pub enum ListState {
    Uninitialized,
    Initialized(Vec<i64>),
}

impl ListState {
    pub fn is_initialized(&self) -> bool {
        matches!(self, ListState::Initialized(_))
    }

    /// Ids head to tail; empty when uninitialized.
    pub fn ids(&self) -> &[i64] {
        match self {
            ListState::Uninitialized => &[],
            ListState::Initialized(ids) => ids,
        }
    }

    pub fn into_ids(self) -> Vec<i64> {
        match self {
            ListState::Uninitialized => Vec::new(),
            ListState::Initialized(ids) => ids,
        }
    }
}

/// The stored value does not follow the `ids.. sentinel` layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorruptList {
    pub list_key: String,
    pub detail: String,
}

impl std::fmt::Display for CorruptList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "corrupt list '{}': {}", self.list_key, self.detail)
    }
}

impl std::error::Error for CorruptList {}

#[derive(Clone, Copy, Debug)]
enum Neighbor {
    Previous,
    Next,
}

#[derive(Clone)]
pub struct OrderedList {
    store: Arc<dyn ListStore>,
    key: String,
    settings: ListSettings,
}

impl std::fmt::Debug for OrderedList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedList")
            .field("store", &self.store.name())
            .field("key", &self.key)
            .finish()
    }
}

impl OrderedList {
    pub fn new(store: Arc<dyn ListStore>, key: impl Into<String>) -> Self {
        Self::with_settings(store, key, ListSettings::default())
    }

    pub fn with_settings(
        store: Arc<dyn ListStore>,
        key: impl Into<String>,
        settings: ListSettings,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            settings,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn settings(&self) -> &ListSettings {
        &self.settings
    }

    /// The advisory lock guarding position-dependent updates of this list.
    pub fn lock(&self) -> DistributedLock {
        DistributedLock::new(
            Arc::clone(&self.store),
            &self.key,
            self.settings.lock.clone(),
        )
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn state(&self) -> Result<ListState> {
        let raw = self
            .store
            .range(&self.key)
            .await
            .with_context(|| format!("reading list '{}'", self.key))?;
        self.decode(raw)
    }

    pub async fn is_initialized(&self) -> Result<bool> {
        Ok(self.state().await?.is_initialized())
    }

    /// Number of ids, or `None` when the list was never initialized.
    pub async fn length(&self) -> Result<Option<usize>> {
        Ok(match self.state().await? {
            ListState::Uninitialized => None,
            ListState::Initialized(ids) => Some(ids.len()),
        })
    }

    /// All ids head to tail.
    pub async fn all(&self) -> Result<Vec<i64>> {
        Ok(self.state().await?.into_ids())
    }

    pub async fn contains(&self, id: i64) -> Result<bool> {
        Ok(self.all().await?.contains(&id))
    }

    /// Position of the first occurrence of `id`.
    pub async fn index_of(&self, id: i64) -> Result<Option<usize>> {
        Ok(self.all().await?.iter().position(|&x| x == id))
    }

    // -----------------------------------------------------------------------
    // Inserts
    // -----------------------------------------------------------------------

    /// Insert at the head unless already present. Returns `true` if inserted.
    pub async fn unshift(&self, id: i64) -> Result<bool> {
        if self.contains(id).await? {
            return Ok(false);
        }
        self.unshift_force(id).await?;
        Ok(true)
    }

    /// Insert at the head even if `id` is already present.
    pub async fn unshift_force(&self, id: i64) -> Result<()> {
        self.exec(vec![self.seal(), ListCommand::PushLeft(id.to_string())])
            .await
    }

    /// Insert at the tail unless already present. Returns `true` if inserted.
    pub async fn push(&self, id: i64) -> Result<bool> {
        if self.contains(id).await? {
            return Ok(false);
        }
        self.push_force(id).await?;
        Ok(true)
    }

    /// Insert at the tail even if `id` is already present.
    pub async fn push_force(&self, id: i64) -> Result<()> {
        let mut batch = vec![self.seal()];
        batch.extend(self.before_sentinel(id));
        self.exec(batch).await
    }

    // -----------------------------------------------------------------------
    // Removal / bulk
    // -----------------------------------------------------------------------

    /// Remove the first occurrence of `id`; no-op when absent.
    pub async fn remove(&self, id: i64) -> Result<()> {
        self.exec(vec![ListCommand::RemoveFirst(id.to_string())])
            .await
    }

    /// Drop every id but keep the list initialized.
    pub async fn clear(&self) -> Result<()> {
        self.exec(vec![ListCommand::Delete, self.seal()]).await
    }

    /// Delete the key entirely; the list reads as uninitialized afterwards.
    pub async fn uninitialize(&self) -> Result<()> {
        self.exec(vec![ListCommand::Delete]).await
    }

    /// Atomically replace the contents with `ids`, head to tail.
    pub async fn replace_all(&self, ids: &[i64]) -> Result<()> {
        let mut batch = Vec::with_capacity(ids.len() + 2);
        batch.push(ListCommand::Delete);
        batch.extend(ids.iter().map(|id| ListCommand::PushRight(id.to_string())));
        batch.push(self.seal());
        self.exec(batch).await
    }

    // -----------------------------------------------------------------------
    // Moves
    // -----------------------------------------------------------------------

    /// Move `id` to the head. Returns `false` (no-op) when absent.
    ///
    /// Presence is checked inside the batch, so a concurrent removal or
    /// uninitialize is never undone.
    pub async fn move_to_top(&self, id: i64) -> Result<bool> {
        self.exec_conditional(vec![ListCommand::MoveToHead(id.to_string())])
            .await
    }

    /// Move `id` to the tail. Returns `false` (no-op) when absent.
    pub async fn move_to_bottom(&self, id: i64) -> Result<bool> {
        self.exec_conditional(vec![ListCommand::MoveBeforeTail(id.to_string())])
            .await
    }

    /// Swap `id` with its predecessor under the list lock. Returns `false`
    /// when `id` is absent or already at the head.
    pub async fn move_up(&self, id: i64) -> Result<bool> {
        self.lock()
            .with_lock(|| self.swap_with(id, Neighbor::Previous))
            .await
    }

    /// Swap `id` with its successor under the list lock. Returns `false`
    /// when `id` is absent or already at the tail.
    pub async fn move_down(&self, id: i64) -> Result<bool> {
        self.lock()
            .with_lock(|| self.swap_with(id, Neighbor::Next))
            .await
    }

    async fn swap_with(&self, id: i64, neighbor: Neighbor) -> Result<bool> {
        let ids = self.all().await?;
        let Some(pos) = ids.iter().position(|&x| x == id) else {
            return Ok(false);
        };
        let other = match neighbor {
            Neighbor::Previous if pos == 0 => return Ok(false),
            Neighbor::Previous => pos - 1,
            Neighbor::Next if pos + 1 >= ids.len() => return Ok(false),
            Neighbor::Next => pos + 1,
        };

        self.exec(vec![
            ListCommand::SetAt {
                index: other,
                value: id.to_string(),
            },
            ListCommand::SetAt {
                index: pos,
                value: ids[other].to_string(),
            },
        ])
        .await?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn seal(&self) -> ListCommand {
        ListCommand::EnsureTail(self.settings.sentinel.clone())
    }

    /// Commands placing `id` just in front of the sentinel.
    fn before_sentinel(&self, id: i64) -> [ListCommand; 3] {
        [
            ListCommand::PopRight,
            ListCommand::PushRight(id.to_string()),
            ListCommand::PushRight(self.settings.sentinel.clone()),
        ]
    }

    async fn exec(&self, batch: Vec<ListCommand>) -> Result<()> {
        self.exec_conditional(batch).await?;
        Ok(())
    }

    /// Run `batch`; `false` when a conditional move found nothing to move.
    async fn exec_conditional(&self, batch: Vec<ListCommand>) -> Result<bool> {
        debug!(list_key = %self.key, commands = batch.len(), "list batch");
        self.store
            .exec(&self.key, &batch)
            .await
            .with_context(|| format!("updating list '{}'", self.key))
    }

    fn decode(&self, mut raw: Vec<String>) -> Result<ListState> {
        if raw.is_empty() {
            return Ok(ListState::Uninitialized);
        }
        if raw.last() != Some(&self.settings.sentinel) {
            return Err(CorruptList {
                list_key: self.key.clone(),
                detail: "missing sentinel at tail".to_string(),
            }
            .into());
        }
        raw.pop();

        let ids = raw
            .iter()
            .map(|e| {
                e.parse::<i64>().map_err(|_| CorruptList {
                    list_key: self.key.clone(),
                    detail: format!("element '{e}' is not an id"),
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(ListState::Initialized(ids))
    }
}
