//! Mounts a derived route table on an axum router.
//! Path params, query string and JSON body become a [`RouteRequest`]; the
//! route's responder renders whatever the request resolves to.

use crate::error::AppError;
use crate::routes::{Route, RouteRequest, RouteTable};
use axum::{
    body::Bytes,
    extract::{Path, Query},
    response::Response,
    routing::{on, MethodFilter},
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

/// Maximum accepted request body.
pub const BODY_LIMIT: usize = 1024 * 1024;

async fn serve(
    route: &Route,
    params: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Bytes,
) -> Response {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(v) => Some(v),
            Err(e) => {
                let err = AppError::BadRequest(format!("invalid JSON body: {}", e));
                return route.responder.respond(route.action, Err(err));
            }
        }
    };
    let outcome = route.dispatch(RouteRequest { params, query, body }).await;
    route.responder.respond(route.action, outcome)
}

pub fn resource_routes(table: &RouteTable) -> Router {
    let mut router = Router::new();
    for route in table.routes() {
        let Ok(filter) = MethodFilter::try_from(route.method.clone()) else {
            tracing::warn!(method = %route.method, path = %route.path, "unsupported method, route skipped");
            continue;
        };
        let path = route.path.clone();
        let route = Arc::new(route.clone());
        let handler = move |params: Option<Path<HashMap<String, String>>>,
                            Query(query): Query<HashMap<String, String>>,
                            body: Bytes| {
            let route = route.clone();
            async move {
                let params = params.map(|Path(p)| p).unwrap_or_default();
                serve(&route, params, query, body).await
            }
        };
        router = router.route(&path, on(filter, handler));
    }
    router.layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(BODY_LIMIT)))
}

impl RouteTable {
    /// Consumes the table into an axum router.
    pub fn into_router(self) -> Router {
        resource_routes(&self)
    }
}
