//! Declarative validation rules checked before any storage call.

use crate::config::ValidationRule;
use crate::driver::Record;
use crate::error::AppError;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a full record against per-field rules. All required fields must be present.
    pub fn validate(
        body: &Record,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), AppError> {
        for (col, rule) in rules {
            let val = body.get(col);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                return Err(AppError::ValidationFailure(format!("{} is required", col)));
            }
            if let Some(v) = val {
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in a merge patch. Required is not enforced for missing fields.
    pub fn validate_partial(
        body: &Record,
        rules: &HashMap<String, ValidationRule>,
    ) -> Result<(), AppError> {
        for (col, v) in body {
            if let Some(rule) = rules.get(col) {
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }
}

fn fail(msg: String) -> Result<(), AppError> {
    Err(AppError::ValidationFailure(msg))
}

fn validate_field(field: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        check_format(field, v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        match (rule.min_length, rule.max_length) {
            (Some(min), _) if len < min as usize => {
                return fail(format!("{} must be at least {} characters", field, min));
            }
            (_, Some(max)) if len > max as usize => {
                return fail(format!("{} must be at most {} characters", field, max));
            }
            _ => {}
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern)
                .map_err(|_| AppError::ValidationFailure(format!("invalid pattern for {}", field)))?;
            if !re.is_match(s) {
                return fail(format!("{} does not match required pattern", field));
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| same_value(v, a)) {
            return fail(format!("{} must be one of: {:?}", field, allowed));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum.filter(|min| n < *min) {
            return fail(format!("{} must be at least {}", field, min));
        }
        if let Some(max) = rule.maximum.filter(|max| n > *max) {
            return fail(format!("{} must be at most {}", field, max));
        }
    }
    Ok(())
}

/// Numbers compare by value so `1` and `1.0` are the same.
fn same_value(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

fn check_format(field: &str, v: &Value, format: &str) -> Result<(), AppError> {
    let Some(s) = v.as_str() else {
        return Ok(());
    };
    let ok = match format.to_lowercase().as_str() {
        "email" => s.len() >= 3 && s.contains('@'),
        "uuid" => uuid::Uuid::parse_str(s).is_ok(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        fail(format!("{} must be a valid {}", field, format))
    }
}
