//! Relation operations: one-to-many children, one-to-one lookups and
//! pivot-mediated many-to-many associations.

use crate::config::foreign_key;
use crate::driver::{id_string, Criteria, Record, ID_FIELD};
use crate::error::{AppError, StoreError};
use crate::resource::ResourceContext;
use crate::service::crud::query_criteria;
use crate::store::Store;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A declared relation from the owning resource to the store of `name`.
#[derive(Clone)]
pub struct Relation {
    pub owner: Arc<ResourceContext>,
    /// Singular relation name.
    pub name: String,
    pub store: Store,
}

impl Relation {
    /// Field on children pointing at the owner (`user_id`).
    fn owner_key(&self) -> String {
        self.owner.resource.foreign_key()
    }

    /// Child by its own id, provided it belongs to `owner_id`.
    async fn owned(&self, owner_id: &str, child_id: &str) -> Result<Record, AppError> {
        let child = self.store.read(child_id).await?;
        let belongs = child
            .get(&self.owner_key())
            .and_then(id_string)
            .is_some_and(|fk| fk == owner_id);
        if !belongs {
            return Err(AppError::NotFound(format!(
                "{}/{} does not belong to {}/{}",
                self.store.collection(),
                child_id,
                self.owner.resource.name,
                owner_id
            )));
        }
        Ok(child)
    }

    fn strip_id(&self, body: &mut Record) {
        if !self.owner.resource.allow_forced_ids {
            body.remove(ID_FIELD);
        }
    }
}

/// A many-to-many relation: the related store plus the pivot store linking it to the owner.
#[derive(Clone)]
pub struct PivotBinding {
    pub owner: Arc<ResourceContext>,
    pub relation: String,
    pub related: Store,
    pub pivot: Store,
}

/// Pivot identity for a pair. A JSON array keeps distinct pairs distinct whatever the ids contain.
fn pivot_id(owner_id: &str, related_id: &str) -> String {
    Value::Array(vec![
        Value::String(owner_id.to_string()),
        Value::String(related_id.to_string()),
    ])
    .to_string()
}

pub struct RelationService;

impl RelationService {
    /// Stores `body` as a child of `owner_id`; the foreign key from the path overrides the body.
    pub async fn create_child(rel: &Relation, owner_id: &str, mut body: Record) -> Result<Record, AppError> {
        rel.strip_id(&mut body);
        body.insert(rel.owner_key(), Value::String(owner_id.to_string()));
        Ok(rel.store.create(body).await?)
    }

    pub async fn read_child(rel: &Relation, owner_id: &str, child_id: &str) -> Result<Record, AppError> {
        rel.owned(owner_id, child_id).await
    }

    pub async fn update_child(
        rel: &Relation,
        owner_id: &str,
        child_id: &str,
        mut patch: Record,
    ) -> Result<Record, AppError> {
        rel.owned(owner_id, child_id).await?;
        rel.strip_id(&mut patch);
        patch.insert(rel.owner_key(), Value::String(owner_id.to_string()));
        Ok(rel
            .store
            .update(child_id, patch, rel.owner.resource.update_mode())
            .await?)
    }

    pub async fn destroy_child(rel: &Relation, owner_id: &str, child_id: &str) -> Result<Record, AppError> {
        rel.owned(owner_id, child_id).await?;
        rel.store.destroy(child_id).await?;
        let mut gone = Record::new();
        gone.insert(ID_FIELD.to_string(), Value::String(child_id.to_string()));
        Ok(gone)
    }

    /// Children of `owner_id`, further narrowed by query-string criteria.
    pub async fn list_children(
        rel: &Relation,
        owner_id: &str,
        query: HashMap<String, String>,
    ) -> Result<Vec<Record>, AppError> {
        let criteria = query_criteria(query).eq(rel.owner_key(), owner_id);
        Ok(rel.store.list(criteria).await?)
    }

    /// Reads the owner, then the record its `{relation}_id` field points at.
    pub async fn read_one(rel: &Relation, owner_id: &str) -> Result<Record, AppError> {
        let owner = rel.owner.store.read(owner_id).await?;
        let key = foreign_key(&rel.name);
        let Some(target) = owner.get(&key).and_then(id_string) else {
            return Err(AppError::NotFound(format!(
                "{}/{} has no {}",
                rel.owner.resource.name, owner_id, key
            )));
        };
        Ok(rel.store.read(&target).await?)
    }

    /// Creates the pivot record for `(owner_id, related_id)` unless it already exists.
    /// The related id comes from the path, or from `{relation}_id` in the body.
    ///
    /// The pivot row's `_id` is derived from the pair, so two concurrent associations
    /// of the same pair collide in the store and only one of them is written.
    pub async fn associate(
        binding: &PivotBinding,
        owner_id: &str,
        related_id: Option<String>,
        mut body: Record,
    ) -> Result<Record, AppError> {
        let owner_key = binding.owner.resource.foreign_key();
        let related_key = foreign_key(&binding.relation);
        let related_id = related_id
            .or_else(|| body.get(&related_key).and_then(id_string))
            .ok_or_else(|| AppError::BadRequest(format!("{} is required", related_key)))?;

        let duplicate = || {
            AppError::DuplicateAssociation(format!(
                "{} {} already linked to {} {}",
                binding.owner.resource.name, owner_id, binding.relation, related_id
            ))
        };
        let criteria = Criteria::new()
            .eq(owner_key.clone(), owner_id)
            .eq(related_key.clone(), related_id.clone());
        if !binding.pivot.list(criteria).await?.is_empty() {
            return Err(duplicate());
        }

        body.insert(ID_FIELD.to_string(), Value::String(pivot_id(owner_id, &related_id)));
        body.insert(owner_key, Value::String(owner_id.to_string()));
        body.insert(related_key, Value::String(related_id.clone()));
        match binding.pivot.create(body).await {
            Ok(link) => Ok(link),
            Err(StoreError::IdentityConflict { .. }) => Err(duplicate()),
            Err(e) => Err(e.into()),
        }
    }

    /// Pivot rows of `owner_id`, then one in-set read of the related records.
    pub async fn list_associated(binding: &PivotBinding, owner_id: &str) -> Result<Vec<Record>, AppError> {
        let related_key = foreign_key(&binding.relation);
        let links = binding
            .pivot
            .list(Criteria::new().eq(binding.owner.resource.foreign_key(), owner_id))
            .await?;

        let mut seen = HashSet::new();
        let ids: Vec<Value> = links
            .iter()
            .filter_map(|link| link.get(&related_key).and_then(id_string))
            .filter(|id| seen.insert(id.clone()))
            .map(Value::String)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(binding
            .related
            .list(Criteria::new().in_set(ID_FIELD, ids))
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Defaults};
    use crate::driver::MemoryDriver;
    use crate::resource::ResourceDefinition;
    use serde_json::json;

    fn memory(collection: &str) -> Store {
        Store::new(Arc::new(MemoryDriver::new(collection)))
    }

    fn owner() -> Arc<ResourceContext> {
        let def = ResourceDefinition::new();
        let resolved = resolve("user", &def.config, &Defaults::default()).unwrap();
        Arc::new(def.into_context(resolved, memory("users")))
    }

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    fn articles() -> Relation {
        Relation {
            owner: owner(),
            name: "article".into(),
            store: memory("articles"),
        }
    }

    #[tokio::test]
    async fn children_are_scoped_to_their_owner() {
        let rel = articles();
        let mine = RelationService::create_child(&rel, "5", record(json!({ "title": "x", "user_id": "9" })))
            .await
            .unwrap();
        assert_eq!(mine["user_id"], json!("5"));
        RelationService::create_child(&rel, "6", record(json!({ "title": "y" })))
            .await
            .unwrap();

        let listed = RelationService::list_children(&rel, "5", HashMap::new()).await.unwrap();
        assert_eq!(listed, vec![mine.clone()]);

        let id = mine[ID_FIELD].as_str().unwrap();
        assert!(RelationService::read_child(&rel, "5", id).await.is_ok());
        assert!(matches!(
            RelationService::read_child(&rel, "6", id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(RelationService::destroy_child(&rel, "6", id).await.is_err());
        assert!(rel.store.read(id).await.is_ok());
    }

    #[tokio::test]
    async fn query_cannot_override_owner_key() {
        let rel = articles();
        RelationService::create_child(&rel, "5", Record::new()).await.unwrap();
        RelationService::create_child(&rel, "6", Record::new()).await.unwrap();
        let q = HashMap::from([("user_id".to_string(), "6".to_string())]);
        let listed = RelationService::list_children(&rel, "5", q).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0]["user_id"], json!("5"));
    }

    #[tokio::test]
    async fn update_child_keeps_foreign_key() {
        let rel = articles();
        let c = RelationService::create_child(&rel, "5", record(json!({ "title": "x" })))
            .await
            .unwrap();
        let id = c[ID_FIELD].as_str().unwrap();
        let u = RelationService::update_child(&rel, "5", id, record(json!({ "title": "z", "user_id": "6" })))
            .await
            .unwrap();
        assert_eq!(u["user_id"], json!("5"));
        assert_eq!(u["title"], json!("z"));
    }

    #[tokio::test]
    async fn read_one_follows_parent_key() {
        let rel = Relation {
            owner: owner(),
            name: "profile".into(),
            store: memory("profiles"),
        };
        let profile = rel.store.create(record(json!({ "bio": "hi" }))).await.unwrap();
        let user = rel
            .owner
            .store
            .create(record(json!({ "profile_id": profile[ID_FIELD].clone() })))
            .await
            .unwrap();
        let got = RelationService::read_one(&rel, user[ID_FIELD].as_str().unwrap())
            .await
            .unwrap();
        assert_eq!(got, profile);
        assert!(matches!(
            RelationService::read_one(&rel, "missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_association_leaves_pivot_unchanged() {
        let binding = PivotBinding {
            owner: owner(),
            relation: "tag".into(),
            related: memory("tags"),
            pivot: memory("user_tags"),
        };
        let rust = binding.related.create(record(json!({ "label": "rust" }))).await.unwrap();
        let go = binding.related.create(record(json!({ "label": "go" }))).await.unwrap();
        binding.related.create(record(json!({ "label": "c" }))).await.unwrap();
        let rust_id = rust[ID_FIELD].as_str().unwrap().to_string();
        let go_id = go[ID_FIELD].as_str().unwrap().to_string();

        RelationService::associate(&binding, "5", Some(rust_id.clone()), Record::new())
            .await
            .unwrap();
        RelationService::associate(&binding, "5", None, record(json!({ "tag_id": go_id })))
            .await
            .unwrap();
        let err = RelationService::associate(&binding, "5", Some(rust_id), Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateAssociation(_)));
        assert_eq!(binding.pivot.list(None).await.unwrap().len(), 2);

        let tags = RelationService::list_associated(&binding, "5").await.unwrap();
        let mut labels: Vec<_> = tags.iter().map(|t| t["label"].clone()).collect();
        labels.sort_by_key(|v| v.to_string());
        assert_eq!(labels, vec![json!("go"), json!("rust")]);
        assert!(RelationService::list_associated(&binding, "6").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn association_needs_a_related_id() {
        let binding = PivotBinding {
            owner: owner(),
            relation: "tag".into(),
            related: memory("tags"),
            pivot: memory("user_tags"),
        };
        assert!(matches!(
            RelationService::associate(&binding, "5", None, Record::new()).await,
            Err(AppError::BadRequest(_))
        ));
    }
}
