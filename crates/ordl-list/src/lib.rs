//! ordl-list
//!
//! Ordered-list engine over an [`ordl_store::ListStore`].
//!
//! - [`OrderedList`]: membership, index, head/tail insert, remove, bulk
//!   replace and moves for one list key.
//! - [`DistributedLock`]: advisory `<key>:lock` with TTL, fixed-interval
//!   polling and a hard acquisition timeout; guards `move_up`/`move_down`.
//! - [`reconcile`]: pure [`merge`] of an ordering with the authoritative id
//!   set, plus [`refresh`] and [`update_ordering`] on top of it.
//!
//! Batch operations (`replace_all`, `clear`, `move_to_top`,
//! `move_to_bottom`) do not take the lock, and neither does reconciliation.
//! A batch move racing a locked move on the same key is not serialized.

mod list;
mod lock;
pub mod reconcile;
mod settings;

pub use list::{CorruptList, ListState, OrderedList};
pub use lock::{lock_key_for, DistributedLock, LockGuard, LockTimeout, LOCK_SUFFIX};
pub use reconcile::{
    merge, refresh, update_ordering, update_with_callback, Correction, MergeMode, Reconciled,
};
pub use settings::{
    ListSettings, LockSettings, DEFAULT_ACQUIRE_TIMEOUT, DEFAULT_LOCK_TTL, DEFAULT_POLL_INTERVAL,
    DEFAULT_SENTINEL,
};
