//! `ordl list <key> ...` handlers.
//!
//! Handlers take any `ListStore` and return the `key=value` lines to print,
//! so they run the same against Postgres and the in-memory store.

use super::join_ids;
use anyhow::Result;
use clap::Subcommand;
use ordl_list::{refresh, update_ordering, ListSettings, ListState, MergeMode, OrderedList};
use ordl_store::ListStore;
use std::sync::Arc;

#[derive(Subcommand, Debug)]
pub enum ListCmd {
    /// Print state, length and ids
    Show,

    /// Replace contents with the given ids (initializes the list)
    Init {
        #[arg(value_delimiter = ',', allow_negative_numbers = true)]
        ids: Vec<i64>,
    },

    /// Insert at the tail
    Push {
        #[arg(allow_negative_numbers = true)]
        id: i64,
        /// Insert even if the id is already present
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Insert at the head
    Unshift {
        #[arg(allow_negative_numbers = true)]
        id: i64,
        /// Insert even if the id is already present
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Remove the first occurrence of an id
    Remove {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },

    /// Remove every id, keeping the list initialized
    Clear,

    /// Delete the list entirely
    Uninit,

    /// Move an id to the head
    Top {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },

    /// Move an id to the tail
    Bottom {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },

    /// Swap an id with its predecessor (locked)
    Up {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },

    /// Swap an id with its successor (locked)
    Down {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },

    /// Reconcile the stored list with the authoritative ids
    Refresh {
        #[arg(value_delimiter = ',', allow_negative_numbers = true)]
        authoritative: Vec<i64>,
        /// Place new ids after the stored ones
        #[arg(long, default_value_t = false)]
        append: bool,
    },

    /// Store a caller ordering, repaired against the authoritative ids
    Reorder {
        /// Caller ordering, comma separated
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        ids: Vec<i64>,
        /// Authoritative ids, comma separated
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
        authoritative: Vec<i64>,
        /// Place new ids after the supplied ones
        #[arg(long, default_value_t = false)]
        append: bool,
    },
}

fn mode_for(append: bool, settings: &ListSettings) -> MergeMode {
    if append {
        MergeMode::Append
    } else {
        settings.merge_mode
    }
}

pub async fn run(
    store: Arc<dyn ListStore>,
    key: &str,
    settings: ListSettings,
    cmd: ListCmd,
) -> Result<Vec<String>> {
    let list = OrderedList::with_settings(store, key, settings);
    let mut out = vec![format!("list_key={}", list.key())];

    match cmd {
        ListCmd::Show => match list.state().await? {
            ListState::Uninitialized => out.push("state=uninitialized".to_string()),
            ListState::Initialized(ids) => {
                out.push("state=initialized".to_string());
                out.push(format!("length={}", ids.len()));
                out.push(format!("ids={}", join_ids(&ids)));
            }
        },

        ListCmd::Init { ids } => {
            list.replace_all(&ids).await?;
            out.push(format!("length={}", ids.len()));
        }

        ListCmd::Push { id, force } => {
            let changed = if force {
                list.push_force(id).await?;
                true
            } else {
                list.push(id).await?
            };
            out.push(format!("changed={changed}"));
        }

        ListCmd::Unshift { id, force } => {
            let changed = if force {
                list.unshift_force(id).await?;
                true
            } else {
                list.unshift(id).await?
            };
            out.push(format!("changed={changed}"));
        }

        ListCmd::Remove { id } => {
            let present = list.contains(id).await?;
            list.remove(id).await?;
            out.push(format!("changed={present}"));
        }

        ListCmd::Clear => {
            list.clear().await?;
            out.push("cleared=true".to_string());
        }

        ListCmd::Uninit => {
            list.uninitialize().await?;
            out.push("state=uninitialized".to_string());
        }

        ListCmd::Top { id } => out.push(format!("moved={}", list.move_to_top(id).await?)),
        ListCmd::Bottom { id } => out.push(format!("moved={}", list.move_to_bottom(id).await?)),
        ListCmd::Up { id } => out.push(format!("moved={}", list.move_up(id).await?)),
        ListCmd::Down { id } => out.push(format!("moved={}", list.move_down(id).await?)),

        ListCmd::Refresh {
            authoritative,
            append,
        } => {
            let mode = mode_for(append, list.settings());
            let ids = refresh(&list, &authoritative, mode).await?;
            out.push(format!("merge_mode={}", mode.as_str()));
            out.push(format!("ids={}", join_ids(&ids)));
        }

        ListCmd::Reorder {
            ids,
            authoritative,
            append,
        } => {
            let mode = mode_for(append, list.settings());
            let r = update_ordering(&list, &ids, &authoritative, mode).await?;
            out.push(format!("merge_mode={}", mode.as_str()));
            out.push(format!("ids={}", join_ids(&r.ids)));
            match &r.correction {
                None => out.push("corrected=false".to_string()),
                Some(c) => {
                    out.push("corrected=true".to_string());
                    out.push(format!("supplied={}", join_ids(&c.supplied)));
                    out.push(format!("inserted={}", join_ids(&c.inserted())));
                    out.push(format!("dropped={}", join_ids(&c.dropped())));
                }
            }
        }
    }

    Ok(out)
}
