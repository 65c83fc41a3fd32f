//! Uniform CRUD contract every storage backend implements.
//!
//! Records are JSON objects. The public identity lives in [`ID_FIELD`]; a backend
//! with a different native identity translates at each read/write boundary so
//! callers never see the internal form.
//!
//! Missing ids: `read`, `update` and `destroy` all fail with
//! [`StoreError::NotFound`] in every built-in driver.

mod memory;
mod postgres;
mod registry;

pub use memory::MemoryDriver;
pub use postgres::PostgresDriver;
pub use registry::{DriverFactory, DriverRegistry};

use crate::error::StoreError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Public identity field carried by every persisted record.
pub const ID_FIELD: &str = "_id";

pub type Record = Map<String, Value>;

/// How `update` combines the patch with the stored record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateMode {
    /// Full replacement; only the identity survives.
    Replace,
    /// Shallow merge; fields absent from the patch survive.
    Merge,
}

impl UpdateMode {
    pub fn from_destructive(destructive: bool) -> Self {
        if destructive {
            UpdateMode::Replace
        } else {
            UpdateMode::Merge
        }
    }
}

/// Expected value of a single field in a list query.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Eq(Value),
    In(Vec<Value>),
}

impl Condition {
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match (self, value) {
            (Condition::Eq(expected), Some(v)) => v == expected,
            (Condition::In(set), Some(v)) => set.contains(v),
            (_, None) => false,
        }
    }
}

/// Field -> condition mapping. Empty criteria match every record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Criteria {
    fields: BTreeMap<String, Condition>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), Condition::Eq(value.into()));
        self
    }

    pub fn in_set(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.fields.insert(field.into(), Condition::In(values));
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, condition: Condition) {
        self.fields.insert(field.into(), condition);
    }

    pub fn get(&self, field: &str) -> Option<&Condition> {
        self.fields.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Condition)> {
        self.fields.iter()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.fields
            .iter()
            .all(|(field, cond)| cond.matches(record.get(field)))
    }
}

impl FromIterator<(String, Value)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Criteria {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k, Condition::Eq(v)))
                .collect(),
        }
    }
}

#[async_trait]
pub trait Driver: Send + Sync {
    /// Collection this driver instance is bound to.
    fn collection(&self) -> &str;

    /// Stores a record, generating an identity when absent. Returns the stored record.
    async fn create(&self, record: Record) -> Result<Record, StoreError>;

    async fn read(&self, id: &str) -> Result<Record, StoreError>;

    /// Applies `patch`. If the patch carries a different identity the record is
    /// re-keyed; an occupied target fails with `IdentityConflict` and nothing changes.
    async fn update(&self, id: &str, patch: Record, mode: UpdateMode) -> Result<Record, StoreError>;

    async fn destroy(&self, id: &str) -> Result<(), StoreError>;

    async fn list(&self, criteria: &Criteria) -> Result<Vec<Record>, StoreError>;

    /// Completes once the backend connection is established. Safe to call any number of times.
    async fn ready(&self) -> Result<(), StoreError>;
}

/// Identity value as a string key. Numbers are accepted and stringified.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Normalises or generates the identity of a new record and returns it.
pub(crate) fn ensure_id(record: &mut Record) -> String {
    let id = record
        .get(ID_FIELD)
        .and_then(id_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    id
}

/// Combines a stored record with a patch. Returns the resulting identity and record.
pub(crate) fn apply_patch(
    current: Record,
    id: &str,
    mut patch: Record,
    mode: UpdateMode,
) -> (String, Record) {
    let next_id = patch
        .remove(ID_FIELD)
        .as_ref()
        .and_then(id_string)
        .unwrap_or_else(|| id.to_string());
    let mut next = match mode {
        UpdateMode::Replace => patch,
        UpdateMode::Merge => {
            let mut merged = current;
            merged.extend(patch);
            merged
        }
    };
    next.insert(ID_FIELD.to_string(), Value::String(next_id.clone()));
    (next_id, next)
}
