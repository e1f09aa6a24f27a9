//! Batch command vocabulary shared by every backend.
//!
//! A batch is applied to a working copy of the list and only committed when
//! every command succeeded, so a rejected batch leaves the stored value
//! untouched.
//!
//! Conditional commands (`MoveToHead`, `MoveBeforeTail`) look their value up
//! inside the batch, so the check and the write cannot be split by another
//! writer. The batch reports whether every conditional command found its
//! value.

/// One list mutation inside an atomic batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListCommand {
    /// Insert at the head.
    PushLeft(String),
    /// Insert at the tail.
    PushRight(String),
    /// Drop the tail element. No-op on an empty list.
    PopRight,
    /// Remove the first element equal to the value, if any.
    RemoveFirst(String),
    /// Overwrite the element at `index`. Out of range rejects the batch.
    SetAt { index: usize, value: String },
    /// Append the value unless it is already the tail element.
    EnsureTail(String),
    /// Drop every element (the key becomes absent).
    Delete,
    /// Move the first occurrence of the value to the head. No-op when absent.
    MoveToHead(String),
    /// Move the first occurrence of the value to just before the tail
    /// element. No-op when absent.
    MoveBeforeTail(String),
}

/// A batch could not be applied; nothing from it was written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchRejected {
    pub list_key: String,
    pub reason: String,
}

impl std::fmt::Display for BatchRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batch rejected for list '{}': {}",
            self.list_key, self.reason
        )
    }
}

impl std::error::Error for BatchRejected {}

/// Apply `batch` to `items` all-or-nothing.
///
/// Returns `false` when a conditional command did not find its value.
pub fn apply_batch(
    list_key: &str,
    items: &mut Vec<String>,
    batch: &[ListCommand],
) -> Result<bool, BatchRejected> {
    let mut next = items.clone();
    let mut applied = true;

    for cmd in batch {
        match cmd {
            ListCommand::PushLeft(v) => next.insert(0, v.clone()),
            ListCommand::PushRight(v) => next.push(v.clone()),
            ListCommand::PopRight => {
                next.pop();
            }
            ListCommand::RemoveFirst(v) => {
                if let Some(pos) = next.iter().position(|x| x == v) {
                    next.remove(pos);
                }
            }
            ListCommand::SetAt { index, value } => match next.get_mut(*index) {
                Some(slot) => *slot = value.clone(),
                None => {
                    return Err(BatchRejected {
                        list_key: list_key.to_string(),
                        reason: format!("set-at index {index} out of range (len {})", next.len()),
                    })
                }
            },
            ListCommand::EnsureTail(v) => {
                if next.last() != Some(v) {
                    next.push(v.clone());
                }
            }
            ListCommand::Delete => next.clear(),
            ListCommand::MoveToHead(v) => match next.iter().position(|x| x == v) {
                Some(pos) => {
                    let moved = next.remove(pos);
                    next.insert(0, moved);
                }
                None => applied = false,
            },
            ListCommand::MoveBeforeTail(v) => match next.iter().position(|x| x == v) {
                Some(pos) => {
                    let moved = next.remove(pos);
                    let at = next.len().saturating_sub(1);
                    next.insert(at, moved);
                }
                None => applied = false,
            },
        }
    }

    *items = next;
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn push_pop_and_remove_first_only_touches_first_match() {
        let mut items = strs(&["a", "b", "a"]);
        apply_batch(
            "k",
            &mut items,
            &[
                ListCommand::RemoveFirst("a".into()),
                ListCommand::PushLeft("z".into()),
                ListCommand::PopRight,
                ListCommand::PushRight("y".into()),
            ],
        )
        .unwrap();
        assert_eq!(items, strs(&["z", "b", "y"]));
    }

    #[test]
    fn ensure_tail_is_idempotent() {
        let mut items = strs(&["1"]);
        apply_batch("k", &mut items, &[ListCommand::EnsureTail("*".into())]).unwrap();
        apply_batch("k", &mut items, &[ListCommand::EnsureTail("*".into())]).unwrap();
        assert_eq!(items, strs(&["1", "*"]));
    }

    #[test]
    fn pop_on_empty_is_noop() {
        let mut items = Vec::new();
        apply_batch("k", &mut items, &[ListCommand::PopRight]).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn conditional_moves_apply_only_when_present() {
        let mut items = strs(&["1", "5", "4", "2", "*"]);
        assert!(apply_batch("k", &mut items, &[ListCommand::MoveToHead("4".into())]).unwrap());
        assert_eq!(items, strs(&["4", "1", "5", "2", "*"]));

        assert!(apply_batch("k", &mut items, &[ListCommand::MoveBeforeTail("4".into())]).unwrap());
        assert_eq!(items, strs(&["1", "5", "2", "4", "*"]));

        assert!(!apply_batch("k", &mut items, &[ListCommand::MoveToHead("9".into())]).unwrap());
        assert!(!apply_batch("k", &mut items, &[ListCommand::MoveBeforeTail("9".into())]).unwrap());
        assert_eq!(items, strs(&["1", "5", "2", "4", "*"]));
    }

    #[test]
    fn conditional_moves_on_empty_list_write_nothing() {
        let mut items = Vec::new();
        assert!(!apply_batch("k", &mut items, &[ListCommand::MoveToHead("4".into())]).unwrap());
        assert!(!apply_batch("k", &mut items, &[ListCommand::MoveBeforeTail("4".into())]).unwrap());
        assert!(items.is_empty());
    }

    #[test]
    fn rejected_batch_leaves_items_untouched() {
        let mut items = strs(&["1", "2"]);
        let err = apply_batch(
            "k",
            &mut items,
            &[
                ListCommand::Delete,
                ListCommand::SetAt {
                    index: 0,
                    value: "9".into(),
                },
            ],
        )
        .unwrap_err();

        assert_eq!(err.list_key, "k");
        assert!(err.reason.contains("out of range"));
        assert_eq!(items, strs(&["1", "2"]));
    }
}
