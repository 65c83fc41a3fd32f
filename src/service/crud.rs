//! Primary CRUD against a resource's own store.

use crate::driver::{Criteria, Record, ID_FIELD};
use crate::error::{AppError, StoreError};
use crate::resource::ResourceContext;
use serde_json::Value;
use std::collections::HashMap;

pub struct CrudService;

impl CrudService {
    /// Validates, then creates. A forced id already in use fails before the write is attempted.
    pub async fn create(
        ctx: &ResourceContext,
        forced_id: Option<String>,
        mut body: Record,
    ) -> Result<Record, AppError> {
        if !ctx.resource.allow_forced_ids {
            body.remove(ID_FIELD);
        }
        if let Some(id) = forced_id {
            body.insert(ID_FIELD.to_string(), Value::String(id));
        }
        ctx.check(&body, false)?;

        if let Some(id) = body.get(ID_FIELD).and_then(crate::driver::id_string) {
            match ctx.store.read(&id).await {
                Ok(_) => {
                    return Err(AppError::IdentityConflict(format!(
                        "{}/{} already exists",
                        ctx.store.collection(),
                        id
                    )))
                }
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let record = ctx.store.create(body).await?;
        ctx.after_create(&record);
        Ok(record)
    }

    pub async fn read(ctx: &ResourceContext, id: &str) -> Result<Record, AppError> {
        Ok(ctx.store.read(id).await?)
    }

    /// Merge or replace per the resource's `destructive` flag. Re-keying needs forced ids.
    pub async fn update(ctx: &ResourceContext, id: &str, mut patch: Record) -> Result<Record, AppError> {
        if !ctx.resource.allow_forced_ids {
            patch.remove(ID_FIELD);
        }
        ctx.check(&patch, !ctx.resource.destructive)?;
        let record = ctx.store.update(id, patch, ctx.resource.update_mode()).await?;
        ctx.after_update(&record);
        Ok(record)
    }

    /// Resolves with `{_id}` of the removed record.
    pub async fn destroy(ctx: &ResourceContext, id: &str) -> Result<Record, AppError> {
        ctx.store.destroy(id).await?;
        let mut gone = Record::new();
        gone.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        Ok(gone)
    }

    /// Query-string pairs become exact-match criteria.
    pub async fn list(ctx: &ResourceContext, query: HashMap<String, String>) -> Result<Vec<Record>, AppError> {
        Ok(ctx.store.list(query_criteria(query)).await?)
    }
}

pub(crate) fn query_criteria(query: HashMap<String, String>) -> Criteria {
    query
        .into_iter()
        .map(|(field, value)| (field, Value::String(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Defaults};
    use crate::driver::MemoryDriver;
    use crate::resource::ResourceDefinition;
    use crate::store::Store;
    use serde_json::json;
    use std::sync::Arc;

    fn context(def: ResourceDefinition) -> ResourceContext {
        let resolved = resolve("user", &def.config, &Defaults::default()).unwrap();
        let store = Store::new(Arc::new(MemoryDriver::new("users")));
        def.into_context(resolved, store)
    }

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn caller_id_is_ignored_without_forced_ids() {
        let ctx = context(ResourceDefinition::new());
        let r = CrudService::create(&ctx, None, record(json!({ "_id": "mine" })))
            .await
            .unwrap();
        assert_ne!(r[ID_FIELD], json!("mine"));
    }

    #[tokio::test]
    async fn forced_id_in_use_is_a_conflict() {
        let ctx = context(ResourceDefinition::new().allow_forced_ids(true));
        CrudService::create(&ctx, Some("u1".into()), Record::new())
            .await
            .unwrap();
        let err = CrudService::create(&ctx, Some("u1".into()), Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IdentityConflict(_)));
        assert_eq!(ctx.store.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_payload_never_reaches_storage() {
        let ctx = context(ResourceDefinition::new().validate(|r| r.contains_key("email")));
        let err = CrudService::create(&ctx, None, Record::new()).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationFailure(_)));
        assert!(ctx.store.list(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_cannot_rekey_without_forced_ids() {
        let ctx = context(ResourceDefinition::new());
        let r = CrudService::create(&ctx, None, record(json!({ "a": 1 })))
            .await
            .unwrap();
        let id = r[ID_FIELD].as_str().unwrap();
        let u = CrudService::update(&ctx, id, record(json!({ "_id": "other", "a": 2 })))
            .await
            .unwrap();
        assert_eq!(u[ID_FIELD], json!(id));
        assert_eq!(u["a"], json!(2));
    }

    #[tokio::test]
    async fn destroy_missing_is_not_found() {
        let ctx = context(ResourceDefinition::new());
        assert!(matches!(
            CrudService::destroy(&ctx, "nope").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_filters_by_query() {
        let ctx = context(ResourceDefinition::new());
        CrudService::create(&ctx, None, record(json!({ "role": "admin" })))
            .await
            .unwrap();
        CrudService::create(&ctx, None, record(json!({ "role": "guest" })))
            .await
            .unwrap();
        let q = HashMap::from([("role".to_string(), "admin".to_string())]);
        assert_eq!(CrudService::list(&ctx, q).await.unwrap().len(), 1);
    }
}
