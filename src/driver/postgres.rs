//! PostgreSQL document driver. One JSONB table per collection.
//!
//! The native identity is the `id` column; `_id` is stripped from the stored
//! document and re-attached on every read. The table (and its schema) is created
//! on the first call to `ready`, which every operation awaits.

use super::{apply_patch, ensure_id, Criteria, Driver, Record, UpdateMode, ID_FIELD};
use crate::error::StoreError;
use crate::sql::{self, bind_all, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Row};
use tokio::sync::OnceCell;

pub struct PostgresDriver {
    collection: String,
    schema: String,
    table: String,
    pool: PgPool,
    init: OnceCell<()>,
}

impl PostgresDriver {
    pub fn new(pool: PgPool, schema: impl Into<String>, collection: impl Into<String>) -> Self {
        let schema = schema.into();
        let collection = collection.into();
        PostgresDriver {
            table: sql::qualified_table(&schema, &collection),
            collection,
            schema,
            pool,
            init: OnceCell::new(),
        }
    }

    async fn fetch_one(&self, conn: &mut PgConnection, q: &QueryBuf) -> Result<Option<Record>, StoreError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let row = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_optional(&mut *conn)
            .await?;
        row.map(|r| row_to_record(&r)).transpose()
    }
}

/// Rebuilds the public record from `(id, doc)`.
fn row_to_record(row: &PgRow) -> Result<Record, StoreError> {
    let id: String = row.try_get("id")?;
    let Json(doc): Json<Value> = row.try_get("doc")?;
    let mut record = match doc {
        Value::Object(m) => m,
        _ => Record::new(),
    };
    record.insert(ID_FIELD.to_string(), Value::String(id));
    Ok(record)
}

/// Splits a public record into its native id and stored document.
fn into_doc(mut record: Record) -> Value {
    record.remove(ID_FIELD);
    Value::Object(record)
}

#[async_trait]
impl Driver for PostgresDriver {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn create(&self, mut record: Record) -> Result<Record, StoreError> {
        self.ready().await?;
        let id = ensure_id(&mut record);
        let q = sql::insert(&self.table, &id, into_doc(record));
        let mut conn = self.pool.acquire().await?;
        self.fetch_one(&mut conn, &q)
            .await?
            .ok_or_else(|| StoreError::conflict(&self.collection, &id))
    }

    async fn read(&self, id: &str) -> Result<Record, StoreError> {
        self.ready().await?;
        let q = sql::select_by_id(&self.table, id);
        let mut conn = self.pool.acquire().await?;
        self.fetch_one(&mut conn, &q)
            .await?
            .ok_or_else(|| StoreError::not_found(&self.collection, id))
    }

    async fn update(&self, id: &str, patch: Record, mode: UpdateMode) -> Result<Record, StoreError> {
        self.ready().await?;
        let mut tx = self.pool.begin().await?;
        let current = self
            .fetch_one(&mut tx, &sql::select_for_update(&self.table, id))
            .await?
            .ok_or_else(|| StoreError::not_found(&self.collection, id))?;
        let (next_id, next) = apply_patch(current, id, patch, mode);

        let stored = if next_id == id {
            self.fetch_one(&mut tx, &sql::update_doc(&self.table, id, into_doc(next)))
                .await?
        } else {
            if self
                .fetch_one(&mut tx, &sql::select_for_update(&self.table, &next_id))
                .await?
                .is_some()
            {
                return Err(StoreError::conflict(&self.collection, &next_id));
            }
            let del = sql::delete(&self.table, id);
            bind_all(sqlx::query(&del.sql), &del.params)
                .execute(&mut *tx)
                .await?;
            self.fetch_one(&mut tx, &sql::insert(&self.table, &next_id, into_doc(next)))
                .await?
        };
        let stored = stored.ok_or_else(|| StoreError::conflict(&self.collection, &next_id))?;
        tx.commit().await?;
        Ok(stored)
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        self.ready().await?;
        let q = sql::delete(&self.table, id);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let done = bind_all(sqlx::query(&q.sql), &q.params)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() == 0 {
            return Err(StoreError::not_found(&self.collection, id));
        }
        Ok(())
    }

    async fn list(&self, criteria: &Criteria) -> Result<Vec<Record>, StoreError> {
        self.ready().await?;
        let q = sql::select_list(&self.table, criteria);
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let rows = bind_all(sqlx::query(&q.sql), &q.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn ready(&self) -> Result<(), StoreError> {
        self.init
            .get_or_try_init(|| async {
                sqlx::query(&sql::create_schema(&self.schema))
                    .execute(&self.pool)
                    .await?;
                sqlx::query(&sql::create_table(&self.table))
                    .execute(&self.pool)
                    .await?;
                tracing::info!(collection = %self.collection, table = %self.table, "postgres collection ready");
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }
}
