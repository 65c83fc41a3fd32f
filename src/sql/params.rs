//! Bind values for document-table queries.

use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;
use sqlx::types::Json;

/// A value bound to a document-table query: either a plain text column value
/// (identity, JSON key) or a JSONB document/fragment.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Text(String),
    Json(Value),
}

/// Bind every parameter of `params` to `query` in order.
pub fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [PgBindValue],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        query = match p {
            PgBindValue::Text(s) => query.bind(s.as_str()),
            PgBindValue::Json(v) => query.bind(Json(v)),
        };
    }
    query
}
