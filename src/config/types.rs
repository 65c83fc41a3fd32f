//! Raw configuration types as read from JSON. Every field is optional; absent
//! values are filled from [`Defaults`] during resolution.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Backend selection and connection parameters.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// Registered driver name (`memory`, `postgres`, ...).
    #[serde(rename = "type")]
    pub driver: Option<String>,
    /// Database name: snapshot sub-directory for memory, schema for postgres.
    pub name: Option<String>,
    /// Snapshot directory for the memory driver.
    pub path: Option<PathBuf>,
    /// Connection URL for networked drivers.
    pub url: Option<String>,
    pub max_connections: Option<u32>,
}

impl DbConfig {
    /// Fields set on `self` win; the rest come from `base`.
    pub fn merged_over(&self, base: &DbConfig) -> DbConfig {
        DbConfig {
            driver: self.driver.clone().or_else(|| base.driver.clone()),
            name: self.name.clone().or_else(|| base.name.clone()),
            path: self.path.clone().or_else(|| base.path.clone()),
            url: self.url.clone().or_else(|| base.url.clone()),
            max_connections: self.max_connections.or(base.max_connections),
        }
    }
}

/// Declared relations. Names may be given singular or plural.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationsConfig {
    pub many: Vec<String>,
    pub one: Vec<String>,
    /// relation name -> pivot name
    pub many_to_many: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

/// One resource as written by the user.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub base: Option<String>,
    pub db: DbConfig,
    pub allow_forced_ids: Option<bool>,
    pub destructive: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub relations: RelationsConfig,
    pub validation: HashMap<String, ValidationRule>,
}

/// Engine-wide defaults every resource is merged over.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub base: String,
    pub db: DbConfig,
    pub allow_forced_ids: bool,
    pub destructive: bool,
    pub timeout_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Defaults {
            base: String::new(),
            db: DbConfig {
                driver: Some("memory".into()),
                name: Some("default".into()),
                path: None,
                url: None,
                max_connections: Some(DEFAULT_MAX_CONNECTIONS),
            },
            allow_forced_ids: false,
            destructive: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// A definitions file: optional defaults plus named resources.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefinitionsFile {
    pub defaults: Defaults,
    pub resources: BTreeMap<String, ResourceConfig>,
}
