//! Per-deployment tunables for lists and their locks.
//!
//! Built from the canonical config JSON produced by `ordl-config`. Every key
//! is optional; absent keys take the defaults below.
//!
//! ```text
//! /lists/sentinel          string, must not parse as an integer   default "*"
//! /lists/merge_mode        "prepend" | "append"                    default prepend
//! /lock/ttl_ms             > 0                                     default 5000
//! /lock/poll_interval_ms   > 0                                     default 250
//! /lock/timeout_ms         >= 0                                    default 2000
//! ```

use crate::reconcile::MergeMode;
use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_SENTINEL: &str = "*";
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockSettings {
    /// Lifetime of a lock key; bounds how long a crashed holder blocks others.
    pub ttl: Duration,
    /// Sleep between acquisition attempts.
    pub poll_interval: Duration,
    /// Cumulative wait after which acquisition fails.
    pub timeout: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_LOCK_TTL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListSettings {
    /// Tail marker of an initialized list.
    pub sentinel: String,
    /// Placement of newly eligible ids during reconciliation.
    pub merge_mode: MergeMode,
    pub lock: LockSettings,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL.to_string(),
            merge_mode: MergeMode::default(),
            lock: LockSettings::default(),
        }
    }
}

impl ListSettings {
    /// Build from canonical config JSON (produced by ordl-config).
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let mut out = Self::default();

        if let Some(v) = cfg.pointer("/lists/sentinel") {
            out.sentinel = v
                .as_str()
                .ok_or_else(|| anyhow!("lists.sentinel must be a string"))?
                .to_string();
        }

        if let Some(v) = cfg.pointer("/lists/merge_mode") {
            let s = v
                .as_str()
                .ok_or_else(|| anyhow!("lists.merge_mode must be a string"))?;
            out.merge_mode = MergeMode::parse(s)?;
        }

        if let Some(ms) = millis_at(cfg, "/lock/ttl_ms")? {
            out.lock.ttl = ms;
        }
        if let Some(ms) = millis_at(cfg, "/lock/poll_interval_ms")? {
            out.lock.poll_interval = ms;
        }
        if let Some(ms) = millis_at(cfg, "/lock/timeout_ms")? {
            out.lock.timeout = ms;
        }

        out.validate()?;
        Ok(out)
    }

    pub fn validate(&self) -> Result<()> {
        let s = self.sentinel.trim();
        if s.is_empty() {
            bail!("lists.sentinel must not be empty");
        }
        if s.parse::<i64>().is_ok() {
            bail!("lists.sentinel '{s}' collides with the id encoding (must not be an integer)");
        }
        if self.lock.ttl.is_zero() {
            bail!("lock.ttl_ms must be > 0");
        }
        if self.lock.poll_interval.is_zero() {
            bail!("lock.poll_interval_ms must be > 0");
        }
        Ok(())
    }
}

/// Read a non-negative millisecond count. Accepts number or numeric string.
fn millis_at(cfg: &Value, ptr: &str) -> Result<Option<Duration>> {
    let ms = match cfg.pointer(ptr) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        Some(_) => None,
    };
    match ms {
        Some(ms) => Ok(Some(Duration::from_millis(ms))),
        None => Err(anyhow!(
            "{} must be a non-negative integer of milliseconds",
            ptr.trim_start_matches('/').replace('/', ".")
        )),
    }
}
