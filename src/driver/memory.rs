//! In-process reference driver: a map from identity to record.
//!
//! With a snapshot file every successful mutation rewrites the whole collection
//! before the call returns. Not meant for large data sets; no cross-process
//! durability and no multi-record transactions.

use super::{apply_patch, ensure_id, Criteria, Driver, Record, UpdateMode};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

type Records = BTreeMap<String, Record>;

pub struct MemoryDriver {
    collection: String,
    records: RwLock<Records>,
    snapshot: Option<PathBuf>,
}

impl MemoryDriver {
    pub fn new(collection: impl Into<String>) -> Self {
        MemoryDriver {
            collection: collection.into(),
            records: RwLock::new(BTreeMap::new()),
            snapshot: None,
        }
    }

    /// Driver persisted to `file`. Existing contents are loaded; a missing file starts empty.
    pub fn with_snapshot(collection: impl Into<String>, file: impl AsRef<Path>) -> Result<Self, StoreError> {
        let file = file.as_ref().to_path_buf();
        let records = match std::fs::read(&file) {
            Ok(bytes) if bytes.is_empty() => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        let collection = collection.into();
        tracing::debug!(collection = %collection, file = %file.display(), count = records.len(), "loaded snapshot");
        Ok(MemoryDriver {
            collection,
            records: RwLock::new(records),
            snapshot: Some(file),
        })
    }

    /// Writes the snapshot via a temp file and rename. Called with the write lock held.
    async fn persist(&self, records: &Records) -> Result<(), StoreError> {
        let Some(file) = &self.snapshot else {
            return Ok(());
        };
        if let Some(dir) = file.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let tmp = file.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(records)?).await?;
        tokio::fs::rename(&tmp, file).await?;
        Ok(())
    }

    /// Applies `change` to the collection. With a snapshot the change is made on a
    /// copy that replaces the live map only once the file is written.
    async fn commit<F>(&self, records: &mut Records, change: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Records) + Send,
    {
        if self.snapshot.is_none() {
            change(records);
            return Ok(());
        }
        let mut next = records.clone();
        change(&mut next);
        self.persist(&next).await?;
        *records = next;
        Ok(())
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn create(&self, mut record: Record) -> Result<Record, StoreError> {
        let id = ensure_id(&mut record);
        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Err(StoreError::conflict(&self.collection, &id));
        }
        let stored = record.clone();
        self.commit(&mut records, move |r| {
            r.insert(id, stored);
        })
        .await?;
        Ok(record)
    }

    async fn read(&self, id: &str) -> Result<Record, StoreError> {
        self.records
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(&self.collection, id))
    }

    async fn update(&self, id: &str, patch: Record, mode: UpdateMode) -> Result<Record, StoreError> {
        let mut records = self.records.write().await;
        let current = records
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(&self.collection, id))?;
        let (next_id, next) = apply_patch(current, id, patch, mode);
        if next_id != id && records.contains_key(&next_id) {
            return Err(StoreError::conflict(&self.collection, &next_id));
        }
        let stored = next.clone();
        self.commit(&mut records, move |r| {
            r.remove(id);
            r.insert(next_id, stored);
        })
        .await?;
        Ok(next)
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if !records.contains_key(id) {
            return Err(StoreError::not_found(&self.collection, id));
        }
        self.commit(&mut records, |r| {
            r.remove(id);
        })
        .await
    }

    async fn list(&self, criteria: &Criteria) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| criteria.matches(r))
            .cloned()
            .collect())
    }

    async fn ready(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ID_FIELD;
    use serde_json::{json, Value};

    fn record(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn create_read_destroy() {
        let d = MemoryDriver::new("users");
        let created = d.create(record(json!({ "email": "a@b.com" }))).await.unwrap();
        let id = created[ID_FIELD].as_str().unwrap().to_string();
        assert_eq!(d.read(&id).await.unwrap(), created);
        d.destroy(&id).await.unwrap();
        assert!(matches!(d.read(&id).await, Err(StoreError::NotFound { .. })));
        assert!(matches!(d.destroy(&id).await, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn create_with_taken_id_conflicts() {
        let d = MemoryDriver::new("users");
        d.create(record(json!({ "_id": "x" }))).await.unwrap();
        let err = d.create(record(json!({ "_id": "x", "a": 1 }))).await.unwrap_err();
        assert!(matches!(err, StoreError::IdentityConflict { .. }));
        assert_eq!(d.read("x").await.unwrap().get("a"), None);
    }

    #[tokio::test]
    async fn rekey_moves_record() {
        let d = MemoryDriver::new("users");
        d.create(record(json!({ "_id": "old", "a": 1 }))).await.unwrap();
        let moved = d
            .update("old", record(json!({ "_id": "new" })), UpdateMode::Merge)
            .await
            .unwrap();
        assert_eq!(moved["a"], json!(1));
        assert!(d.read("old").await.is_err());
        assert_eq!(d.read("new").await.unwrap()["a"], json!(1));
    }

    #[tokio::test]
    async fn rekey_onto_occupied_id_leaves_both_untouched() {
        let d = MemoryDriver::new("users");
        d.create(record(json!({ "_id": "a", "v": 1 }))).await.unwrap();
        d.create(record(json!({ "_id": "b", "v": 2 }))).await.unwrap();
        let err = d
            .update("a", record(json!({ "_id": "b", "v": 9 })), UpdateMode::Replace)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IdentityConflict { .. }));
        assert_eq!(d.read("a").await.unwrap()["v"], json!(1));
        assert_eq!(d.read("b").await.unwrap()["v"], json!(2));
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let d = MemoryDriver::new("users");
        let err = d.update("nope", Record::new(), UpdateMode::Merge).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn snapshot_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("app").join("users.json");
        {
            let d = MemoryDriver::with_snapshot("users", &file).unwrap();
            d.create(record(json!({ "_id": "1", "name": "ann" }))).await.unwrap();
            d.create(record(json!({ "_id": "2", "name": "bob" }))).await.unwrap();
            d.destroy("2").await.unwrap();
        }
        let reloaded = MemoryDriver::with_snapshot("users", &file).unwrap();
        let all = reloaded.list(&Criteria::new()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["name"], json!("ann"));
    }

    #[tokio::test]
    async fn failed_snapshot_write_leaves_collection_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let app = dir.path().join("app");
        let d = MemoryDriver::with_snapshot("users", app.join("users.json")).unwrap();
        d.create(record(json!({ "_id": "1", "name": "ann" }))).await.unwrap();

        // A regular file where the snapshot directory should be makes every write fail.
        std::fs::remove_dir_all(&app).unwrap();
        std::fs::write(&app, b"").unwrap();

        assert!(d.create(record(json!({ "_id": "2" }))).await.is_err());
        assert!(matches!(d.read("2").await, Err(StoreError::NotFound { .. })));

        assert!(d
            .update("1", record(json!({ "name": "bob" })), UpdateMode::Merge)
            .await
            .is_err());
        assert!(d
            .update("1", record(json!({ "_id": "9" })), UpdateMode::Merge)
            .await
            .is_err());
        assert!(d.destroy("1").await.is_err());

        let all = d.list(&Criteria::new()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0][ID_FIELD], json!("1"));
        assert_eq!(all[0]["name"], json!("ann"));
    }
}
