//! Many-to-many handlers.

use super::{doc, docs};
use crate::config::foreign_key;
use crate::lifecycle::Resolver;
use crate::routes::{Handler, RouteRequest};
use crate::service::{PivotBinding, RelationService};
use std::sync::Arc;

/// With `from_path` the related id is the `:{relation}_id` segment; otherwise it is read from the body.
pub fn associate(binding: Arc<PivotBinding>, from_path: bool) -> Handler {
    Arc::new(move |mut req: RouteRequest, resolver: Resolver| {
        let binding = binding.clone();
        resolver.resolve_with(async move {
            let owner = req.param("id")?;
            let related = if from_path {
                Some(req.param(&foreign_key(&binding.relation))?)
            } else {
                None
            };
            let body = req.take_body()?;
            Ok(doc(RelationService::associate(&binding, &owner, related, body).await?))
        });
    })
}

pub fn list(binding: Arc<PivotBinding>) -> Handler {
    Arc::new(move |req: RouteRequest, resolver: Resolver| {
        let binding = binding.clone();
        resolver.resolve_with(async move {
            let owner = req.param("id")?;
            Ok(docs(RelationService::list_associated(&binding, &owner).await?))
        });
    })
}
