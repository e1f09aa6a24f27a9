//! Scenario: advisory list lock.
//!
//! GREEN when:
//! - Two concurrent `with_lock` calls on the same key never overlap; the
//!   second runs after the first releases.
//! - A lock held past the acquisition timeout fails the waiter with
//!   `LockTimeout` and the body never runs.
//! - A lock abandoned by a crashed holder is reclaimed after its TTL.
//! - The lock is released when the body fails and when a guard is dropped.
//!
//! Time is paused so TTLs and poll intervals are deterministic.

use anyhow::anyhow;
use ordl_list::*;
use ordl_store::{ListStore, MemoryStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

const LIST_KEY: &str = "ordl:test";

fn setup() -> (Arc<MemoryStore>, DistributedLock) {
    let store = Arc::new(MemoryStore::new());
    let lock = DistributedLock::new(store.clone(), LIST_KEY, LockSettings::default());
    (store, lock)
}

#[tokio::test(start_paused = true)]
async fn concurrent_holders_never_overlap() {
    let (_store, lock) = setup();
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));
    let order = Arc::new(Mutex::new(Vec::new()));

    let worker = |name: &'static str| {
        let lock = lock.clone();
        let inside = Arc::clone(&inside);
        let max_inside = Arc::clone(&max_inside);
        let order = Arc::clone(&order);
        async move {
            lock.with_lock(|| async {
                let n = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(n, Ordering::SeqCst);
                order.lock().unwrap().push(name);
                tokio::time::sleep(Duration::from_millis(600)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await
        }
    };

    let a = tokio::spawn(worker("a"));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let b = tokio::spawn(worker("b"));

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(max_inside.load(Ordering::SeqCst), 1, "bodies overlapped");
    assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn held_lock_times_out_waiter() {
    let (store, lock) = setup();
    assert!(store
        .set_if_absent(lock.lock_key(), "other-holder", Duration::from_secs(10))
        .await
        .unwrap());

    let ran = AtomicUsize::new(0);
    let started = Instant::now();
    let err = lock
        .with_lock(|| async {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap_err();

    let timeout = err
        .downcast_ref::<LockTimeout>()
        .expect("expected LockTimeout");
    assert_eq!(timeout.lock_key, "ordl:test:lock");
    assert!(timeout.waited > DEFAULT_ACQUIRE_TIMEOUT);
    assert!(started.elapsed() <= DEFAULT_ACQUIRE_TIMEOUT + DEFAULT_POLL_INTERVAL);
    assert_eq!(ran.load(Ordering::SeqCst), 0);

    // the foreign lock is untouched
    assert_eq!(
        store.lock_holder(lock.lock_key()).unwrap().as_deref(),
        Some("other-holder")
    );
}

#[tokio::test(start_paused = true)]
async fn crashed_holder_is_reclaimed_after_ttl() {
    let (store, lock) = setup();
    store
        .set_if_absent(lock.lock_key(), "crashed", Duration::from_secs(1))
        .await
        .unwrap();

    let started = Instant::now();
    let out = lock.with_lock(|| async { Ok(7) }).await.unwrap();
    assert_eq!(out, 7);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(store.lock_holder(lock.lock_key()).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn failing_body_still_releases() {
    let (store, lock) = setup();
    let err = lock
        .with_lock(|| async { Err::<(), _>(anyhow!("boom")) })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(store.lock_holder(lock.lock_key()).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn dropped_guard_releases_in_background() {
    let (store, lock) = setup();
    let guard = lock.acquire().await.unwrap();
    assert_eq!(
        store.lock_holder(lock.lock_key()).unwrap().as_deref(),
        Some(guard.token())
    );
    assert!(lock.try_acquire().await.unwrap().is_none());

    drop(guard);
    tokio::task::yield_now().await;
    assert_eq!(store.lock_holder(lock.lock_key()).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn expired_guard_cannot_release_successor() {
    let store = Arc::new(MemoryStore::new());
    let settings = LockSettings {
        ttl: Duration::from_millis(300),
        ..LockSettings::default()
    };
    let lock = DistributedLock::new(store.clone(), LIST_KEY, settings);

    let stale = lock.acquire().await.unwrap();
    tokio::time::advance(Duration::from_millis(400)).await;
    let fresh = lock.acquire().await.unwrap();

    assert!(!stale.release().await.unwrap());
    assert_eq!(
        store.lock_holder(lock.lock_key()).unwrap().as_deref(),
        Some(fresh.token())
    );
    assert!(fresh.release().await.unwrap());
}
