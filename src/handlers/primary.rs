//! Primary resource handlers: create, read, update, destroy, list.

use super::{doc, docs};
use crate::lifecycle::Resolver;
use crate::resource::ResourceContext;
use crate::routes::{Handler, RouteRequest};
use crate::service::CrudService;
use std::sync::Arc;

/// `forced` reads the new record's id from the `:id` path segment.
pub fn create(ctx: Arc<ResourceContext>, forced: bool) -> Handler {
    Arc::new(move |mut req: RouteRequest, resolver: Resolver| {
        let ctx = ctx.clone();
        resolver.resolve_with(async move {
            let body = req.take_body()?;
            let forced_id = if forced { Some(req.param("id")?) } else { None };
            Ok(doc(CrudService::create(&ctx, forced_id, body).await?))
        });
    })
}

pub fn read(ctx: Arc<ResourceContext>) -> Handler {
    Arc::new(move |req: RouteRequest, resolver: Resolver| {
        let ctx = ctx.clone();
        resolver.resolve_with(async move {
            let id = req.param("id")?;
            Ok(doc(CrudService::read(&ctx, &id).await?))
        });
    })
}

pub fn update(ctx: Arc<ResourceContext>) -> Handler {
    Arc::new(move |mut req: RouteRequest, resolver: Resolver| {
        let ctx = ctx.clone();
        resolver.resolve_with(async move {
            let id = req.param("id")?;
            let patch = req.take_body()?;
            Ok(doc(CrudService::update(&ctx, &id, patch).await?))
        });
    })
}

pub fn destroy(ctx: Arc<ResourceContext>) -> Handler {
    Arc::new(move |req: RouteRequest, resolver: Resolver| {
        let ctx = ctx.clone();
        resolver.resolve_with(async move {
            let id = req.param("id")?;
            Ok(doc(CrudService::destroy(&ctx, &id).await?))
        });
    })
}

pub fn list(ctx: Arc<ResourceContext>) -> Handler {
    Arc::new(move |req: RouteRequest, resolver: Resolver| {
        let ctx = ctx.clone();
        resolver.resolve_with(async move { Ok(docs(CrudService::list(&ctx, req.query).await?)) });
    })
}
