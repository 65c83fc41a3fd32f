//! Resolved resource model: config validated, merged over defaults and
//! flattened for runtime use.

use crate::config::ValidationRule;
use crate::driver::UpdateMode;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedDb {
    pub driver: String,
    pub name: String,
    pub path: Option<PathBuf>,
    pub url: Option<String>,
    pub max_connections: u32,
}

/// A many-to-many relation and the pivot collection mediating it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PivotRelation {
    /// Singular relation name (e.g. "tag").
    pub relation: String,
    /// Singular pivot name (e.g. "user_tag").
    pub pivot: String,
}

#[derive(Clone, Debug)]
pub struct ResolvedResource {
    /// Singular name; also the route prefix segment.
    pub name: String,
    /// Plural name; list route segment and collection name.
    pub plural: String,
    /// Path prefix, either empty or starting with '/'.
    pub base: String,
    pub db: ResolvedDb,
    pub allow_forced_ids: bool,
    pub destructive: bool,
    pub timeout: Duration,
    pub many: Vec<String>,
    pub one: Vec<String>,
    pub many_to_many: Vec<PivotRelation>,
    pub validation: HashMap<String, ValidationRule>,
}

impl ResolvedResource {
    pub fn update_mode(&self) -> UpdateMode {
        UpdateMode::from_destructive(self.destructive)
    }

    /// Field holding this resource's id on related records (`user_id`).
    pub fn foreign_key(&self) -> String {
        foreign_key(&self.name)
    }

    /// `{base}/{name}`
    pub fn item_prefix(&self) -> String {
        format!("{}/{}", self.base, self.name)
    }

    /// `{base}/{plural}`
    pub fn list_path(&self) -> String {
        format!("{}/{}", self.base, self.plural)
    }
}

pub fn foreign_key(name: &str) -> String {
    format!("{}_id", name)
}
