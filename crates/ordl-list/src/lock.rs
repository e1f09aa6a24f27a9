//! Advisory per-list lock.
//!
//! The lock is a key `<list key>:lock` created with a TTL. Acquisition polls
//! at a fixed interval until it succeeds or the configured timeout elapses.
//! Each acquirer writes its own random token, and release deletes the key
//! only while it still carries that token, so a holder whose TTL lapsed can
//! never release a successor's lock.
//!
//! Release happens on every exit path of [`DistributedLock::with_lock`].
//! A [`LockGuard`] dropped without an explicit release (panic, cancelled
//! task) schedules the release on the current runtime; if there is none,
//! the TTL reclaims the key.

use crate::settings::LockSettings;
use anyhow::Result;
use ordl_store::ListStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

pub const LOCK_SUFFIX: &str = ":lock";

/// Lock key guarding the list at `list_key`.
pub fn lock_key_for(list_key: &str) -> String {
    format!("{list_key}{LOCK_SUFFIX}")
}

/// Acquisition gave up after the configured timeout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockTimeout {
    pub lock_key: String,
    pub waited: Duration,
}

impl std::fmt::Display for LockTimeout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "timed out acquiring lock '{}' after {}ms",
            self.lock_key,
            self.waited.as_millis()
        )
    }
}

impl std::error::Error for LockTimeout {}

#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn ListStore>,
    lock_key: String,
    settings: LockSettings,
}

impl std::fmt::Debug for DistributedLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedLock")
            .field("store", &self.store.name())
            .field("lock_key", &self.lock_key)
            .field("settings", &self.settings)
            .finish()
    }
}

impl DistributedLock {
    pub fn new(store: Arc<dyn ListStore>, list_key: &str, settings: LockSettings) -> Self {
        Self {
            store,
            lock_key: lock_key_for(list_key),
            settings,
        }
    }

    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    /// Single acquisition attempt.
    pub async fn try_acquire(&self) -> Result<Option<LockGuard>> {
        let token = Uuid::new_v4().to_string();
        let created = self
            .store
            .set_if_absent(&self.lock_key, &token, self.settings.ttl)
            .await?;

        if !created {
            return Ok(None);
        }
        debug!(lock_key = %self.lock_key, "lock acquired");
        Ok(Some(LockGuard {
            store: Arc::clone(&self.store),
            lock_key: self.lock_key.clone(),
            token,
            released: false,
        }))
    }

    /// Poll until acquired; fails with [`LockTimeout`] once the cumulative
    /// wait exceeds the configured timeout.
    pub async fn acquire(&self) -> Result<LockGuard> {
        let started = Instant::now();
        loop {
            if let Some(guard) = self.try_acquire().await? {
                return Ok(guard);
            }

            tokio::time::sleep(self.settings.poll_interval).await;

            let waited = started.elapsed();
            if waited > self.settings.timeout {
                warn!(
                    lock_key = %self.lock_key,
                    waited_ms = waited.as_millis() as u64,
                    "lock acquisition timed out"
                );
                return Err(LockTimeout {
                    lock_key: self.lock_key.clone(),
                    waited,
                }
                .into());
            }
        }
    }

    /// Run `body` while holding the lock, releasing it afterwards whether the
    /// body succeeded or failed.
    pub async fn with_lock<F, Fut, T>(&self, body: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let guard = self.acquire().await?;
        let outcome = body().await;

        match guard.release().await {
            Ok(true) => {}
            Ok(false) => warn!(
                lock_key = %self.lock_key,
                "lock expired before release; critical section outlived its ttl"
            ),
            Err(e) => {
                warn!(lock_key = %self.lock_key, error = %e, "lock release failed; ttl will reclaim it");
                if outcome.is_ok() {
                    return Err(e.context(format!("releasing lock '{}'", self.lock_key)));
                }
            }
        }

        outcome
    }
}

/// Proof of lock ownership. Release explicitly with [`LockGuard::release`].
pub struct LockGuard {
    store: Arc<dyn ListStore>,
    lock_key: String,
    token: String,
    released: bool,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("lock_key", &self.lock_key)
            .field("released", &self.released)
            .finish()
    }
}

impl LockGuard {
    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    /// Token written into the lock key by this holder.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Delete the lock key. Returns `false` when the key had already expired
    /// (and possibly been taken by someone else).
    pub async fn release(mut self) -> Result<bool> {
        self.released = true;
        let deleted = self
            .store
            .delete_if_holder(&self.lock_key, &self.token)
            .await?;
        debug!(lock_key = %self.lock_key, deleted, "lock released");
        Ok(deleted)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let store = Arc::clone(&self.store);
        let lock_key = std::mem::take(&mut self.lock_key);
        let token = std::mem::take(&mut self.token);
        handle.spawn(async move {
            if let Err(e) = store.delete_if_holder(&lock_key, &token).await {
                warn!(lock_key = %lock_key, error = %e, "deferred lock release failed");
            }
        });
    }
}
