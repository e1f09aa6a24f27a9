//! In-process store backend.
//!
//! Every call takes one mutex for its whole duration, which makes each batch
//! trivially atomic. Lock expiry follows the tokio clock so paused-time tests
//! can drive TTLs deterministically.

use crate::batch::{apply_batch, ListCommand};
use crate::traits::ListStore;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
struct LockEntry {
    holder: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct MemoryState {
    lists: HashMap<String, Vec<String>>,
    locks: HashMap<String, LockEntry>,
}

impl MemoryState {
    fn purge_expired_lock(&mut self, key: &str, now: Instant) {
        if let Some(entry) = self.locks.get(key) {
            if entry.expires_at <= now {
                self.locks.remove(key);
            }
        }
    }
}

/// Store backed by process memory. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("memory store mutex poisoned"))
    }

    /// Current holder of a live lock key, if any.
    pub fn lock_holder(&self, key: &str) -> Result<Option<String>> {
        let mut st = self.state()?;
        st.purge_expired_lock(key, Instant::now());
        Ok(st.locks.get(key).map(|e| e.holder.clone()))
    }
}

#[async_trait]
impl ListStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn range(&self, key: &str) -> Result<Vec<String>> {
        let st = self.state()?;
        Ok(st.lists.get(key).cloned().unwrap_or_default())
    }

    async fn len(&self, key: &str) -> Result<usize> {
        let st = self.state()?;
        Ok(st.lists.get(key).map(Vec::len).unwrap_or(0))
    }

    async fn get_at(&self, key: &str, index: usize) -> Result<Option<String>> {
        let st = self.state()?;
        Ok(st.lists.get(key).and_then(|l| l.get(index)).cloned())
    }

    async fn exec(&self, key: &str, batch: &[ListCommand]) -> Result<bool> {
        let mut st = self.state()?;
        let mut items = st.lists.get(key).cloned().unwrap_or_default();
        let applied = apply_batch(key, &mut items, batch)?;

        if items.is_empty() {
            st.lists.remove(key);
        } else {
            st.lists.insert(key.to_string(), items);
        }
        Ok(applied)
    }

    async fn set_if_absent(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut st = self.state()?;
        st.purge_expired_lock(key, now);

        if st.locks.contains_key(key) {
            return Ok(false);
        }
        st.locks.insert(
            key.to_string(),
            LockEntry {
                holder: holder.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn delete_if_holder(&self, key: &str, holder: &str) -> Result<bool> {
        let mut st = self.state()?;
        st.purge_expired_lock(key, Instant::now());

        match st.locks.get(key) {
            Some(entry) if entry.holder == holder => {
                st.locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BatchRejected;

    #[tokio::test]
    async fn absent_key_reads_as_empty() {
        let store = MemoryStore::new();
        assert!(store.range("nope").await.unwrap().is_empty());
        assert_eq!(store.len("nope").await.unwrap(), 0);
        assert_eq!(store.get_at("nope", 0).await.unwrap(), None);
    }

    #[tokio::test]
    async fn single_command_helpers_follow_list_semantics() {
        let store = MemoryStore::new();
        store.push_right("k", "2").await.unwrap();
        store.push_left("k", "1").await.unwrap();
        store.push_right("k", "3").await.unwrap();
        store.set_at("k", 1, "20").await.unwrap();
        store.remove_first("k", "3").await.unwrap();

        assert_eq!(store.range("k").await.unwrap(), vec!["1", "20"]);
        assert_eq!(store.get_at("k", 1).await.unwrap().as_deref(), Some("20"));

        store.delete("k").await.unwrap();
        assert_eq!(store.len("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rejected_batch_is_not_partially_applied() {
        let store = MemoryStore::new();
        store.push_right("k", "1").await.unwrap();

        let err = store
            .exec(
                "k",
                &[
                    ListCommand::PushLeft("0".into()),
                    ListCommand::SetAt {
                        index: 7,
                        value: "x".into(),
                    },
                ],
            )
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<BatchRejected>().is_some());
        assert_eq!(store.range("k").await.unwrap(), vec!["1"]);
    }

    #[tokio::test]
    async fn missed_move_on_absent_key_creates_nothing() {
        let store = MemoryStore::new();
        let applied = store
            .exec("k", &[ListCommand::MoveToHead("4".into())])
            .await
            .unwrap();
        assert!(!applied);
        assert!(store.state().unwrap().lists.get("k").is_none());
    }

    #[tokio::test]
    async fn lock_keys_do_not_collide_with_lists() {
        let store = MemoryStore::new();
        store.push_right("k", "1").await.unwrap();
        assert!(store
            .set_if_absent("k", "holder", Duration::from_secs(5))
            .await
            .unwrap());
        assert_eq!(store.range("k").await.unwrap(), vec!["1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn lock_is_exclusive_until_released_or_expired() {
        let store = MemoryStore::new();
        let ttl = Duration::from_millis(500);

        assert!(store.set_if_absent("k:lock", "a", ttl).await.unwrap());
        assert!(!store.set_if_absent("k:lock", "b", ttl).await.unwrap());

        // only the holder can release
        assert!(!store.delete_if_holder("k:lock", "b").await.unwrap());
        assert!(store.delete_if_holder("k:lock", "a").await.unwrap());
        assert!(store.set_if_absent("k:lock", "b", ttl).await.unwrap());

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(store.lock_holder("k:lock").unwrap(), None);
        assert!(store.set_if_absent("k:lock", "c", ttl).await.unwrap());
        assert!(!store.delete_if_holder("k:lock", "b").await.unwrap());
    }
}
