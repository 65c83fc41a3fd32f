//! One-to-one handler: read-only, follows the owner's `{relation}_id`.

use super::doc;
use crate::lifecycle::Resolver;
use crate::routes::{Handler, RouteRequest};
use crate::service::{Relation, RelationService};
use std::sync::Arc;

pub fn read(rel: Arc<Relation>) -> Handler {
    Arc::new(move |req: RouteRequest, resolver: Resolver| {
        let rel = rel.clone();
        resolver.resolve_with(async move {
            let owner = req.param("id")?;
            Ok(doc(RelationService::read_one(&rel, &owner).await?))
        });
    })
}
