//! Immutable `{method, path, handler}` table produced by the engine.

use crate::driver::Record;
use crate::error::{AppError, ConfigError};
use crate::lifecycle::{channel, Outcome, Resolver};
use crate::response::Responder;
use crate::state::AppState;
use crate::store::Store;
use axum::http::Method;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// What a route does, used to pick the response adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    List,
    Read,
    Create,
    Update,
    Destroy,
}

/// What the HTTP layer hands to a handler.
#[derive(Clone, Debug, Default)]
pub struct RouteRequest {
    pub params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
}

impl RouteRequest {
    pub fn param(&self, name: &str) -> Result<String, AppError> {
        self.params
            .get(name)
            .cloned()
            .ok_or_else(|| AppError::BadRequest(format!("missing path parameter '{}'", name)))
    }

    /// Request body as a record. No body is an empty record; anything but an object is rejected.
    pub fn take_body(&mut self) -> Result<Record, AppError> {
        match self.body.take() {
            None | Some(Value::Null) => Ok(Record::new()),
            Some(Value::Object(m)) => Ok(m),
            Some(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
        }
    }
}

/// Invoked synchronously; must hand the resolver to whatever completes the request.
pub type Handler = Arc<dyn Fn(RouteRequest, Resolver) + Send + Sync>;

#[derive(Clone)]
pub struct Route {
    pub method: Method,
    pub path: String,
    pub action: Action,
    pub handler: Handler,
    pub responder: Arc<dyn Responder>,
    pub timeout: Duration,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("action", &self.action)
            .finish()
    }
}

impl Route {
    /// Creates the completion channel, invokes the handler and waits for the outcome.
    pub async fn dispatch(&self, request: RouteRequest) -> Outcome {
        let (resolver, pending) = channel();
        (self.handler)(request, resolver);
        pending.wait(self.timeout).await
    }
}

#[derive(Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    keys: HashSet<(Method, String)>,
    stores: Vec<Store>,
}

impl RouteTable {
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn find(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.method == *method && r.path == path)
    }

    /// `(METHOD, path)` pairs in registration order.
    pub fn signatures(&self) -> Vec<(String, String)> {
        self.routes
            .iter()
            .map(|r| (r.method.to_string(), r.path.clone()))
            .collect()
    }

    pub fn stores(&self) -> &[Store] {
        &self.stores
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            stores: Arc::new(self.stores.clone()),
        }
    }

    pub(crate) fn push(&mut self, route: Route) -> Result<(), ConfigError> {
        if !self.keys.insert((route.method.clone(), route.path.clone())) {
            return Err(ConfigError::DuplicateRoute {
                method: route.method.to_string(),
                path: route.path,
            });
        }
        tracing::info!(method = %route.method, path = %route.path, "route registered");
        self.routes.push(route);
        Ok(())
    }

    pub(crate) fn track_store(&mut self, store: Store) {
        self.stores.push(store);
    }
}
