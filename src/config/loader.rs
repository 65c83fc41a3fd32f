//! Merge user config over defaults and load definition files.

use crate::config::resolved::{PivotRelation, ResolvedDb, ResolvedResource};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use crate::inflect::{pluralize, singularize};
use std::path::Path;
use std::time::Duration;

/// Build the resolved resource (validates first). `name` may be singular or plural.
pub fn resolve(name: &str, config: &ResourceConfig, defaults: &Defaults) -> Result<ResolvedResource, ConfigError> {
    validate(name, config)?;
    let name = singularize(name);
    let db = resolve_db(&config.db, defaults);

    let many_to_many = config
        .relations
        .many_to_many
        .iter()
        .map(|(relation, pivot)| PivotRelation {
            relation: singularize(relation),
            pivot: singularize(pivot),
        })
        .collect();

    Ok(ResolvedResource {
        plural: pluralize(&name),
        base: config.base.clone().unwrap_or_else(|| defaults.base.clone()),
        db,
        allow_forced_ids: config.allow_forced_ids.unwrap_or(defaults.allow_forced_ids),
        destructive: config.destructive.unwrap_or(defaults.destructive),
        timeout: Duration::from_millis(config.timeout_ms.unwrap_or(defaults.timeout_ms)),
        many: config.relations.many.iter().map(|r| singularize(r)).collect(),
        one: config.relations.one.iter().map(|r| singularize(r)).collect(),
        many_to_many,
        validation: config.validation.clone(),
        name,
    })
}

/// Backend config of `db` over `defaults` over the built-in defaults.
pub fn resolve_db(db: &DbConfig, defaults: &Defaults) -> ResolvedDb {
    let builtin = Defaults::default();
    let db = db.merged_over(&defaults.db.merged_over(&builtin.db));
    ResolvedDb {
        driver: db.driver.unwrap_or_else(|| "memory".into()),
        name: db.name.unwrap_or_else(|| "default".into()),
        path: db.path,
        url: db.url,
        max_connections: db.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS),
    }
}

pub fn parse_definitions(json: &str) -> Result<DefinitionsFile, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read a JSON definitions file: `{ "defaults": {...}, "resources": { name: {...} } }`.
pub async fn load_definitions(path: impl AsRef<Path>) -> Result<DefinitionsFile, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_definitions(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_values_override_defaults() {
        let file = parse_definitions(
            r#"{
                "defaults": { "base": "/api", "db": { "type": "memory", "name": "shop" }, "timeout_ms": 500 },
                "resources": {
                    "users": {
                        "allow_forced_ids": true,
                        "db": { "path": "/tmp/data" },
                        "relations": { "many": ["articles"], "one": ["profile"], "many_to_many": { "tags": "user_tags" } }
                    }
                }
            }"#,
        )
        .unwrap();
        let r = resolve("users", &file.resources["users"], &file.defaults).unwrap();
        assert_eq!(r.name, "user");
        assert_eq!(r.plural, "users");
        assert_eq!(r.base, "/api");
        assert!(r.allow_forced_ids);
        assert!(!r.destructive);
        assert_eq!(r.timeout, Duration::from_millis(500));
        assert_eq!(r.db.driver, "memory");
        assert_eq!(r.db.name, "shop");
        assert_eq!(r.db.path.as_deref(), Some(Path::new("/tmp/data")));
        assert_eq!(r.many, vec!["article".to_string()]);
        assert_eq!(r.one, vec!["profile".to_string()]);
        assert_eq!(
            r.many_to_many,
            vec![PivotRelation {
                relation: "tag".into(),
                pivot: "user_tag".into()
            }]
        );
        assert_eq!(r.foreign_key(), "user_id");
        assert_eq!(r.item_prefix(), "/api/user");
        assert_eq!(r.list_path(), "/api/users");
    }

    #[test]
    fn empty_config_takes_builtin_defaults() {
        let r = resolve("article", &ResourceConfig::default(), &Defaults::default()).unwrap();
        assert_eq!(r.db.driver, "memory");
        assert_eq!(r.db.name, "default");
        assert_eq!(r.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(r.list_path(), "/articles");
    }

    #[test]
    fn malformed_json_is_a_load_error() {
        assert!(matches!(parse_definitions("{"), Err(ConfigError::Load(_))));
    }
}
