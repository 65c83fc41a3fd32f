//! One-to-many handlers: children addressed through their owner.

use super::{doc, docs};
use crate::config::foreign_key;
use crate::lifecycle::Resolver;
use crate::routes::{Handler, RouteRequest};
use crate::service::{Relation, RelationService};
use std::sync::Arc;

/// Path parameter carrying the child's own id (`article_id`).
fn child_param(rel: &Relation) -> String {
    foreign_key(&rel.name)
}

pub fn create(rel: Arc<Relation>) -> Handler {
    Arc::new(move |mut req: RouteRequest, resolver: Resolver| {
        let rel = rel.clone();
        resolver.resolve_with(async move {
            let owner = req.param("id")?;
            let body = req.take_body()?;
            Ok(doc(RelationService::create_child(&rel, &owner, body).await?))
        });
    })
}

pub fn read(rel: Arc<Relation>) -> Handler {
    Arc::new(move |req: RouteRequest, resolver: Resolver| {
        let rel = rel.clone();
        resolver.resolve_with(async move {
            let owner = req.param("id")?;
            let child = req.param(&child_param(&rel))?;
            Ok(doc(RelationService::read_child(&rel, &owner, &child).await?))
        });
    })
}

pub fn update(rel: Arc<Relation>) -> Handler {
    Arc::new(move |mut req: RouteRequest, resolver: Resolver| {
        let rel = rel.clone();
        resolver.resolve_with(async move {
            let owner = req.param("id")?;
            let child = req.param(&child_param(&rel))?;
            let patch = req.take_body()?;
            Ok(doc(RelationService::update_child(&rel, &owner, &child, patch).await?))
        });
    })
}

pub fn destroy(rel: Arc<Relation>) -> Handler {
    Arc::new(move |req: RouteRequest, resolver: Resolver| {
        let rel = rel.clone();
        resolver.resolve_with(async move {
            let owner = req.param("id")?;
            let child = req.param(&child_param(&rel))?;
            Ok(doc(RelationService::destroy_child(&rel, &owner, &child).await?))
        });
    })
}

pub fn list(rel: Arc<Relation>) -> Handler {
    Arc::new(move |req: RouteRequest, resolver: Resolver| {
        let rel = rel.clone();
        resolver.resolve_with(async move {
            let owner = req.param("id")?;
            Ok(docs(RelationService::list_children(&rel, &owner, req.query).await?))
        });
    })
}
