//! Backend-agnostic facade over one driver. The only place timestamps are set.

use crate::driver::{Criteria, Driver, Record, UpdateMode};
use crate::error::StoreError;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// RFC 3339 UTC timestamp with fixed precision, so string order is time order.
fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

/// Cheap to clone; all clones share the same driver.
#[derive(Clone)]
pub struct Store {
    driver: Arc<dyn Driver>,
}

impl Store {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Store { driver }
    }

    pub fn collection(&self) -> &str {
        self.driver.collection()
    }

    /// Stamps `created_at` and `updated_at` with the same instant, overwriting caller values.
    pub async fn create(&self, mut record: Record) -> Result<Record, StoreError> {
        let now = timestamp();
        record.insert(CREATED_AT.to_string(), now.clone());
        record.insert(UPDATED_AT.to_string(), now);
        tracing::debug!(collection = %self.collection(), "create");
        self.driver.create(record).await
    }

    pub async fn read(&self, id: &str) -> Result<Record, StoreError> {
        tracing::debug!(collection = %self.collection(), id, "read");
        self.driver.read(id).await
    }

    /// Drops any caller `created_at` and stamps `updated_at`. A replacing update
    /// carries the stored `created_at` over so the creation time is kept.
    pub async fn update(&self, id: &str, mut patch: Record, mode: UpdateMode) -> Result<Record, StoreError> {
        patch.remove(CREATED_AT);
        if mode == UpdateMode::Replace {
            if let Some(created) = self.driver.read(id).await?.remove(CREATED_AT) {
                patch.insert(CREATED_AT.to_string(), created);
            }
        }
        patch.insert(UPDATED_AT.to_string(), timestamp());
        tracing::debug!(collection = %self.collection(), id, ?mode, "update");
        self.driver.update(id, patch, mode).await
    }

    pub async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        tracing::debug!(collection = %self.collection(), id, "destroy");
        self.driver.destroy(id).await
    }

    /// `store.list(None)` and `store.list(criteria)` are both accepted.
    pub async fn list<C: Into<Option<Criteria>>>(&self, criteria: C) -> Result<Vec<Record>, StoreError> {
        let criteria = criteria.into().unwrap_or_default();
        tracing::debug!(collection = %self.collection(), ?criteria, "list");
        self.driver.list(&criteria).await
    }

    pub async fn ready(&self) -> Result<(), StoreError> {
        self.driver.ready().await
    }

    /// Runs `callback` once the backend is ready (immediately if it already is).
    pub fn on_ready<F>(&self, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<(), StoreError>) + Send + 'static,
    {
        let driver = self.driver.clone();
        tokio::spawn(async move {
            callback(driver.ready().await);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{MemoryDriver, ID_FIELD};
    use serde_json::json;

    fn store() -> Store {
        Store::new(Arc::new(MemoryDriver::new("users")))
    }

    fn record(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn create_overwrites_caller_timestamps() {
        let s = store();
        let r = s
            .create(record(json!({ "created_at": "yesterday", "updated_at": "never" })))
            .await
            .unwrap();
        assert_ne!(r[CREATED_AT], json!("yesterday"));
        assert_eq!(r[CREATED_AT], r[UPDATED_AT]);
    }

    #[tokio::test]
    async fn update_moves_updated_at_forward_and_keeps_created_at() {
        let s = store();
        let r = s.create(record(json!({ "a": 1 }))).await.unwrap();
        let id = r[ID_FIELD].as_str().unwrap().to_string();
        let u = s
            .update(&id, record(json!({ "a": 2, "created_at": "forged" })), UpdateMode::Merge)
            .await
            .unwrap();
        assert_eq!(u[CREATED_AT], r[CREATED_AT]);
        assert!(u[UPDATED_AT].as_str().unwrap() >= r[UPDATED_AT].as_str().unwrap());
        assert_eq!(u["a"], json!(2));
    }

    #[tokio::test]
    async fn replacing_update_keeps_created_at() {
        let s = store();
        let r = s.create(record(json!({ "a": 1, "b": 1 }))).await.unwrap();
        let id = r[ID_FIELD].as_str().unwrap().to_string();
        let u = s
            .update(&id, record(json!({ "a": 2, "created_at": "forged" })), UpdateMode::Replace)
            .await
            .unwrap();
        assert_eq!(u[CREATED_AT], r[CREATED_AT]);
        assert_eq!(u["a"], json!(2));
        assert!(u.get("b").is_none());
        assert!(matches!(
            s.update("missing", Record::new(), UpdateMode::Replace).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_accepts_optional_criteria() {
        let s = store();
        s.create(record(json!({ "k": "x" }))).await.unwrap();
        s.create(record(json!({ "k": "y" }))).await.unwrap();
        assert_eq!(s.list(None).await.unwrap().len(), 2);
        assert_eq!(s.list(Criteria::new().eq("k", "x")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn on_ready_fires_for_ready_backend() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        store().on_ready(move |res| {
            let _ = tx.send(res.is_ok());
        });
        assert!(rx.await.unwrap());
    }
}
