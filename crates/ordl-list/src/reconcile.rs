//! Reconciliation of a stored (or caller-proposed) ordering with the
//! authoritative id set.
//!
//! [`merge`] is pure. [`refresh`] and [`update_ordering`] read and write
//! through an [`OrderedList`]; neither takes the list lock.

use crate::list::{ListState, OrderedList};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Where ids that are authoritative but not yet ordered are placed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// New ids go in front of the existing ordering.
    #[default]
    Prepend,
    /// New ids go after the existing ordering.
    Append,
}

impl MergeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMode::Prepend => "prepend",
            MergeMode::Append => "append",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepend" => Ok(MergeMode::Prepend),
            "append" => Ok(MergeMode::Append),
            other => bail!("invalid merge mode: {other} (expected prepend | append)"),
        }
    }
}

/// A proposed ordering that had to be repaired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Correction {
    pub supplied: Vec<i64>,
    pub merged: Vec<i64>,
}

impl Correction {
    /// Ids the merge added to the proposal.
    pub fn inserted(&self) -> Vec<i64> {
        let supplied: HashSet<i64> = self.supplied.iter().copied().collect();
        self.merged
            .iter()
            .copied()
            .filter(|id| !supplied.contains(id))
            .collect()
    }

    /// Ids of the proposal the merge dropped as stale.
    pub fn dropped(&self) -> Vec<i64> {
        let merged: HashSet<i64> = self.merged.iter().copied().collect();
        self.supplied
            .iter()
            .copied()
            .filter(|id| !merged.contains(id))
            .collect()
    }
}

/// Outcome of [`update_ordering`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reconciled {
    /// The ordering now stored.
    pub ids: Vec<i64>,
    /// Present only when `ids` differs from what the caller supplied.
    pub correction: Option<Correction>,
}

impl Reconciled {
    pub fn is_clean(&self) -> bool {
        self.correction.is_none()
    }
}

/// Merge `ordering` with `authoritative`.
///
/// Ids of `authoritative` missing from `ordering` are placed in front of it
/// ([`MergeMode::Prepend`]) or after it ([`MergeMode::Append`]), in
/// `authoritative` order. The assembled sequence is then filtered down to
/// members of `authoritative`, which drops stale ids wherever they sat.
pub fn merge(authoritative: &[i64], ordering: &[i64], mode: MergeMode) -> Vec<i64> {
    let ordered: HashSet<i64> = ordering.iter().copied().collect();
    let fresh = authoritative
        .iter()
        .copied()
        .filter(|id| !ordered.contains(id));

    let assembled: Vec<i64> = match mode {
        MergeMode::Prepend => fresh.chain(ordering.iter().copied()).collect(),
        MergeMode::Append => ordering.iter().copied().chain(fresh).collect(),
    };

    let eligible: HashSet<i64> = authoritative.iter().copied().collect();
    assembled
        .into_iter()
        .filter(|id| eligible.contains(id))
        .collect()
}

/// Bring the stored ordering in line with `authoritative`, rewriting it only
/// when the merge changes something (or the list was never initialized).
/// Returns the resulting ordering.
pub async fn refresh(list: &OrderedList, authoritative: &[i64], mode: MergeMode) -> Result<Vec<i64>> {
    let (initialized, stored) = match list.state().await? {
        ListState::Uninitialized => (false, Vec::new()),
        ListState::Initialized(ids) => (true, ids),
    };

    let merged = merge(authoritative, &stored, mode);
    if !initialized || merged != stored {
        info!(
            list_key = list.key(),
            initialized,
            stored = stored.len(),
            merged = merged.len(),
            mode = mode.as_str(),
            "refresh rewriting stored ordering"
        );
        list.replace_all(&merged).await?;
    }
    Ok(merged)
}

/// Store a caller-proposed ordering, repaired against `authoritative`.
///
/// The proposal may be stale: missing newly eligible ids, or carrying ids
/// that no longer qualify. The merged ordering is always stored; when it
/// differs from `supplied` the result carries a [`Correction`].
pub async fn update_ordering(
    list: &OrderedList,
    supplied: &[i64],
    authoritative: &[i64],
    mode: MergeMode,
) -> Result<Reconciled> {
    let merged = merge(authoritative, supplied, mode);
    list.replace_all(&merged).await?;

    let correction = if merged.as_slice() != supplied {
        let c = Correction {
            supplied: supplied.to_vec(),
            merged: merged.clone(),
        };
        warn!(
            list_key = list.key(),
            inserted = ?c.inserted(),
            dropped = ?c.dropped(),
            "supplied ordering was inconsistent with authoritative ids"
        );
        Some(c)
    } else {
        None
    };

    Ok(Reconciled {
        ids: merged,
        correction,
    })
}

/// [`update_ordering`] with the correction delivered to a callback as
/// `(supplied, merged)`. The callback runs only when a correction was made.
pub async fn update_with_callback<F>(
    list: &OrderedList,
    supplied: &[i64],
    authoritative: &[i64],
    mode: MergeMode,
    on_inconsistency: F,
) -> Result<Vec<i64>>
where
    F: FnOnce(&[i64], &[i64]),
{
    let reconciled = update_ordering(list, supplied, authoritative, mode).await?;
    if let Some(c) = &reconciled.correction {
        on_inconsistency(&c.supplied, &c.merged);
    }
    Ok(reconciled.ids)
}
