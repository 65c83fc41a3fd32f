//! Config validation: names, relations and validation rules are checked once
//! at construction.

use crate::config::ResourceConfig;
use crate::error::ConfigError;
use crate::inflect::singularize;
use regex::Regex;
use std::collections::HashSet;

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

pub fn validate(name: &str, config: &ResourceConfig) -> Result<(), ConfigError> {
    if !valid_name(name) {
        return Err(ConfigError::Validation(format!("invalid resource name '{}'", name)));
    }

    if let Some(base) = &config.base {
        if !base.is_empty() && (!base.starts_with('/') || base.ends_with('/')) {
            return Err(ConfigError::Validation(format!(
                "base '{}' must start with '/' and not end with '/'",
                base
            )));
        }
    }

    if let Some(driver) = &config.db.driver {
        if driver.is_empty() {
            return Err(ConfigError::Validation("db.type must not be empty".into()));
        }
    }

    let relations = &config.relations;
    let mut seen = HashSet::new();
    let declared = relations
        .many
        .iter()
        .chain(relations.one.iter())
        .chain(relations.many_to_many.keys());
    for rel in declared {
        if !valid_name(rel) {
            return Err(ConfigError::Validation(format!(
                "invalid relation name '{}' on {}",
                rel, name
            )));
        }
        if !seen.insert(singularize(rel)) {
            return Err(ConfigError::Validation(format!(
                "relation '{}' declared more than once on {}",
                rel, name
            )));
        }
    }

    for (rel, pivot) in &relations.many_to_many {
        if !valid_name(pivot) {
            return Err(ConfigError::MissingReference {
                kind: "pivot",
                id: format!("{} -> '{}'", rel, pivot),
            });
        }
        if singularize(pivot) == singularize(rel) {
            return Err(ConfigError::Validation(format!(
                "pivot '{}' must differ from relation '{}'",
                pivot, rel
            )));
        }
    }

    for (field, rule) in &config.validation {
        if let Some(pattern) = &rule.pattern {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Validation(format!("invalid pattern for {}.{}: {}", name, field, e))
            })?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationRule;

    #[test]
    fn accepts_plain_config() {
        assert!(validate("users", &ResourceConfig::default()).is_ok());
    }

    #[test]
    fn rejects_bad_base_and_names() {
        let mut c = ResourceConfig::default();
        c.base = Some("api/".into());
        assert!(validate("users", &c).is_err());
        assert!(validate("us ers", &ResourceConfig::default()).is_err());
    }

    #[test]
    fn rejects_relation_declared_twice() {
        let mut c = ResourceConfig::default();
        c.relations.many = vec!["articles".into()];
        c.relations.one = vec!["article".into()];
        assert!(matches!(validate("users", &c), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_pivot_equal_to_relation() {
        let mut c = ResourceConfig::default();
        c.relations.many_to_many.insert("tags".into(), "tag".into());
        assert!(validate("users", &c).is_err());
    }

    #[test]
    fn rejects_uncompilable_pattern() {
        let mut c = ResourceConfig::default();
        c.validation.insert(
            "email".into(),
            ValidationRule {
                pattern: Some("(".into()),
                ..Default::default()
            },
        );
        assert!(validate("users", &c).is_err());
    }
}
