//! Builds the statements used by the PostgreSQL document driver.
//!
//! Each collection is a table `(id TEXT PRIMARY KEY, doc JSONB NOT NULL)`. The
//! public identity field is never stored inside `doc`; criteria on it are
//! rewritten to the `id` column.

use crate::driver::{Condition, Criteria, ID_FIELD};
use crate::sql::PgBindValue;
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

pub fn create_schema(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(schema))
}

pub fn create_table(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, doc JSONB NOT NULL)",
        table
    )
}

/// INSERT that yields no row when the id is taken.
pub fn insert(table: &str, id: &str, doc: Value) -> QueryBuf {
    QueryBuf {
        sql: format!(
            "INSERT INTO {} (id, doc) VALUES ($1, $2::jsonb) ON CONFLICT (id) DO NOTHING RETURNING id, doc",
            table
        ),
        params: vec![PgBindValue::Text(id.to_string()), PgBindValue::Json(doc)],
    }
}

pub fn select_by_id(table: &str, id: &str) -> QueryBuf {
    QueryBuf {
        sql: format!("SELECT id, doc FROM {} WHERE id = $1", table),
        params: vec![PgBindValue::Text(id.to_string())],
    }
}

/// Same as [`select_by_id`] but locks the row for the enclosing transaction.
pub fn select_for_update(table: &str, id: &str) -> QueryBuf {
    let mut q = select_by_id(table, id);
    q.sql.push_str(" FOR UPDATE");
    q
}

pub fn update_doc(table: &str, id: &str, doc: Value) -> QueryBuf {
    QueryBuf {
        sql: format!("UPDATE {} SET doc = $2::jsonb WHERE id = $1 RETURNING id, doc", table),
        params: vec![PgBindValue::Text(id.to_string()), PgBindValue::Json(doc)],
    }
}

pub fn delete(table: &str, id: &str) -> QueryBuf {
    QueryBuf {
        sql: format!("DELETE FROM {} WHERE id = $1", table),
        params: vec![PgBindValue::Text(id.to_string())],
    }
}

/// SELECT with one predicate per criterion, ordered by id.
pub fn select_list(table: &str, criteria: &Criteria) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut clauses = Vec::new();
    for (field, cond) in criteria.iter() {
        let target = if field == ID_FIELD {
            "to_jsonb(id)".to_string()
        } else {
            let n = q.push_param(PgBindValue::Text(field.clone()));
            format!("(doc -> ${}::text)", n)
        };
        let clause = match cond {
            Condition::Eq(v) => {
                let n = q.push_param(PgBindValue::Json(v.clone()));
                format!("{} = ${}::jsonb", target, n)
            }
            Condition::In(values) if values.is_empty() => "FALSE".to_string(),
            Condition::In(values) => {
                let n = q.push_param(PgBindValue::Json(Value::Array(values.clone())));
                format!("{} IN (SELECT jsonb_array_elements(${}::jsonb))", target, n)
            }
        };
        clauses.push(clause);
    }
    q.sql = format!("SELECT id, doc FROM {}", table);
    if !clauses.is_empty() {
        q.sql.push_str(" WHERE ");
        q.sql.push_str(&clauses.join(" AND "));
    }
    q.sql.push_str(" ORDER BY id");
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_without_criteria_selects_everything() {
        let q = select_list("\"app\".\"users\"", &Criteria::new());
        assert_eq!(q.sql, "SELECT id, doc FROM \"app\".\"users\" ORDER BY id");
        assert!(q.params.is_empty());
    }

    #[test]
    fn list_rewrites_identity_criteria_to_id_column() {
        let criteria = Criteria::new()
            .in_set(ID_FIELD, vec![json!("a"), json!("b")])
            .eq("user_id", "5");
        let q = select_list("t", &criteria);
        assert_eq!(
            q.sql,
            "SELECT id, doc FROM t WHERE to_jsonb(id) IN (SELECT jsonb_array_elements($1::jsonb)) \
             AND (doc -> $2::text) = $3::jsonb ORDER BY id"
        );
        assert_eq!(
            q.params,
            vec![
                PgBindValue::Json(json!(["a", "b"])),
                PgBindValue::Text("user_id".into()),
                PgBindValue::Json(json!("5")),
            ]
        );
    }

    #[test]
    fn empty_in_set_matches_nothing() {
        let q = select_list("t", &Criteria::new().in_set(ID_FIELD, vec![]));
        assert_eq!(q.sql, "SELECT id, doc FROM t WHERE FALSE ORDER BY id");
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(qualified_table("my\"db", "users"), "\"my\"\"db\".\"users\"");
    }
}
