//! ordl-binding
//!
//! Binds ordered lists to a table of records.
//!
//! Responsibilities:
//! - Derive the list key of a record from its scope attributes
//! - Decide list eligibility from fixed attribute conditions
//! - Keep lists current from record lifecycle hooks (create/update/destroy)
//! - Seed a list from the eligible records of one scope
//! - Arrange records in list order
//!
//! Records are JSON objects carrying an integer `id`. Scope attributes are
//! assumed not to change after a record is created; a record whose scope
//! changes stays in its old list.

use anyhow::{anyhow, Context, Result};
use ordl_list::{refresh, ListSettings, OrderedList};
use ordl_store::ListStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const DEFAULT_KEY_PREFIX: &str = "ordlist";

/// How `initialize` orders the records it seeds a list with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum InitialOrder {
    /// Newest first.
    #[default]
    IdDescending,
    IdAscending,
    /// Sort on one attribute; ties keep ascending id order.
    ByField { field: String, descending: bool },
}

#[derive(Clone)]
pub struct ListBinding {
    store: Arc<dyn ListStore>,
    table: String,
    key_prefix: String,
    /// Sorted, unique.
    scope: Vec<String>,
    conditions: BTreeMap<String, Value>,
    settings: ListSettings,
}

impl std::fmt::Debug for ListBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListBinding")
            .field("store", &self.store.name())
            .field("table", &self.table)
            .field("key_prefix", &self.key_prefix)
            .field("scope", &self.scope)
            .field("conditions", &self.conditions)
            .finish()
    }
}

impl ListBinding {
    pub fn new(store: Arc<dyn ListStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            scope: Vec::new(),
            conditions: BTreeMap::new(),
            settings: ListSettings::default(),
        }
    }

    /// Build from canonical config JSON (produced by ordl-config).
    ///
    /// Optional:
    /// - lists.key_prefix; default "ordlist"
    /// - everything `ListSettings::from_config_json` reads
    pub fn from_config_json(
        store: Arc<dyn ListStore>,
        table: impl Into<String>,
        cfg: &Value,
    ) -> Result<Self> {
        let settings = ListSettings::from_config_json(cfg)?;
        let mut out = Self::new(store, table).with_settings(settings);
        if let Some(v) = cfg.pointer("/lists/key_prefix") {
            let prefix = v
                .as_str()
                .ok_or_else(|| anyhow!("lists.key_prefix must be a string"))?;
            out = out.with_key_prefix(prefix)?;
        }
        Ok(out)
    }

    pub fn scoped_by<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope.extend(attrs.into_iter().map(Into::into));
        self.scope.sort();
        self.scope.dedup();
        self
    }

    /// Only records whose `attr` equals `value` belong in the list.
    /// A `null` value matches a null or missing attribute.
    pub fn with_condition(mut self, attr: impl Into<String>, value: Value) -> Self {
        self.conditions.insert(attr.into(), value);
        self
    }

    pub fn with_key_prefix(mut self, prefix: &str) -> Result<Self> {
        let prefix = prefix.trim();
        if prefix.is_empty() || prefix.contains(':') {
            return Err(anyhow!(
                "lists.key_prefix must be non-empty and free of ':' (got '{prefix}')"
            ));
        }
        self.key_prefix = prefix.to_string();
        Ok(self)
    }

    pub fn with_settings(mut self, settings: ListSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    // -----------------------------------------------------------------------
    // Keys and eligibility
    // -----------------------------------------------------------------------

    /// `<prefix>:<table>` then `:<attr>:<value>` per scope attribute.
    pub fn key_for(&self, record: &Value) -> String {
        let mut key = format!("{}:{}", self.key_prefix, self.table);
        for attr in &self.scope {
            key.push(':');
            key.push_str(attr);
            key.push(':');
            key.push_str(&scope_token(attr_of(record, attr)));
        }
        key
    }

    pub fn list_for(&self, record: &Value) -> OrderedList {
        OrderedList::with_settings(
            Arc::clone(&self.store),
            self.key_for(record),
            self.settings.clone(),
        )
    }

    pub fn meets_conditions(&self, record: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(attr, want)| attr_of(record, attr) == want)
    }

    /// Same scope as `scope_record` and meets the conditions.
    pub fn is_eligible(&self, scope_record: &Value, record: &Value) -> bool {
        self.meets_conditions(record)
            && self
                .scope
                .iter()
                .all(|attr| attr_of(record, attr) == attr_of(scope_record, attr))
    }

    // -----------------------------------------------------------------------
    // Whole-list operations
    // -----------------------------------------------------------------------

    /// Seed the list of `scope_record`'s scope from `records`, replacing any
    /// previous contents. Returns the stored ids.
    pub async fn initialize(
        &self,
        scope_record: &Value,
        records: &[Value],
        order: &InitialOrder,
    ) -> Result<Vec<i64>> {
        let mut eligible: Vec<(i64, &Value)> = Vec::new();
        for r in records.iter().filter(|r| self.is_eligible(scope_record, r)) {
            eligible.push((record_id(r)?, r));
        }

        match order {
            InitialOrder::IdDescending => eligible.sort_by(|a, b| b.0.cmp(&a.0)),
            InitialOrder::IdAscending => eligible.sort_by_key(|(id, _)| *id),
            InitialOrder::ByField { field, descending } => {
                eligible.sort_by(|a, b| {
                    let mut ord = compare_values(attr_of(a.1, field), attr_of(b.1, field));
                    if *descending {
                        ord = ord.reverse();
                    }
                    ord.then(a.0.cmp(&b.0))
                });
            }
        }

        let ids: Vec<i64> = eligible.into_iter().map(|(id, _)| id).collect();
        let list = self.list_for(scope_record);
        list.replace_all(&ids).await?;
        tracing::debug!(list_key = %list.key(), ids = ids.len(), "list initialized from records");
        Ok(ids)
    }

    pub async fn is_initialized(&self, scope_record: &Value) -> Result<bool> {
        self.list_for(scope_record).is_initialized().await
    }

    pub async fn ids(&self, scope_record: &Value) -> Result<Vec<i64>> {
        self.list_for(scope_record).all().await
    }

    /// Stored ids, reconciled first against `authoritative` when given.
    pub async fn checked_ids(
        &self,
        scope_record: &Value,
        authoritative: Option<&[i64]>,
    ) -> Result<Vec<i64>> {
        let list = self.list_for(scope_record);
        match authoritative {
            Some(ids) => refresh(&list, ids, self.settings.merge_mode).await,
            None => list.all().await,
        }
    }

    /// The records of `scope_record`'s list, in list order.
    pub async fn items(&self, scope_record: &Value, records: &[Value]) -> Result<Vec<Value>> {
        let ids = self.ids(scope_record).await?;
        arrange(&ids, records)
    }

    pub async fn clear(&self, scope_record: &Value) -> Result<()> {
        self.list_for(scope_record).clear().await
    }

    // -----------------------------------------------------------------------
    // Lifecycle hooks; each returns whether the list changed
    // -----------------------------------------------------------------------

    pub async fn after_create(&self, record: &Value) -> Result<bool> {
        if !self.meets_conditions(record) {
            return Ok(false);
        }
        let id = record_id(record)?;
        self.list_for(record).unshift(id).await
    }

    pub async fn after_update(&self, record: &Value) -> Result<bool> {
        if self.meets_conditions(record) {
            self.after_create(record).await
        } else {
            self.after_destroy(record).await
        }
    }

    pub async fn after_destroy(&self, record: &Value) -> Result<bool> {
        let id = record_id(record)?;
        let list = self.list_for(record);
        if !list.contains(id).await? {
            return Ok(false);
        }
        list.remove(id).await?;
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Record moves
    // -----------------------------------------------------------------------

    pub async fn move_to_top(&self, record: &Value) -> Result<bool> {
        self.list_for(record).move_to_top(record_id(record)?).await
    }

    pub async fn move_up(&self, record: &Value) -> Result<bool> {
        self.list_for(record).move_up(record_id(record)?).await
    }

    pub async fn move_down(&self, record: &Value) -> Result<bool> {
        self.list_for(record).move_down(record_id(record)?).await
    }

    pub async fn move_to_bottom(&self, record: &Value) -> Result<bool> {
        self.list_for(record).move_to_bottom(record_id(record)?).await
    }
}

/// `records` sorted by position in `ids`; records not in `ids` are dropped.
/// Ids with no matching record are skipped.
pub fn arrange(ids: &[i64], records: &[Value]) -> Result<Vec<Value>> {
    let mut by_id: HashMap<i64, &Value> = HashMap::with_capacity(records.len());
    for r in records {
        by_id.entry(record_id(r)?).or_insert(r);
    }
    Ok(ids
        .iter()
        .filter_map(|id| by_id.get(id).map(|r| (*r).clone()))
        .collect())
}

pub fn record_id(record: &Value) -> Result<i64> {
    record
        .get("id")
        .and_then(Value::as_i64)
        .with_context(|| format!("record has no integer id: {record}"))
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

static NULL: Value = Value::Null;

fn attr_of<'a>(record: &'a Value, attr: &str) -> &'a Value {
    record.get(attr).unwrap_or(&NULL)
}

fn scope_token(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// null < bool < number < string; other kinds compare by their JSON text.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            _ => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a)
            .cmp(&rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}
