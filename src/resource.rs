//! Resource definitions and the runtime context their routes close over.

use crate::config::{DbConfig, ResolvedResource, ResourceConfig, ValidationRule};
use crate::driver::Record;
use crate::engine::StoreCache;
use crate::error::{AppError, ConfigError};
use crate::handlers::{many, one, pivot, primary};
use crate::inflect::pluralize;
use crate::response::{JsonEnvelope, Responder};
use crate::routes::{Action, Handler, Route};
use crate::service::{PivotBinding, Relation, RequestValidator};
use crate::store::Store;
use axum::http::Method;
use std::collections::HashMap;
use std::sync::Arc;

/// User validation predicate. `false` rejects the payload before any storage call.
pub type Predicate = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Runs after a successful write with the stored record.
pub type Hook = Arc<dyn Fn(&Record) -> Result<(), HookError> + Send + Sync>;

const ACTIONS: [Action; 5] = [
    Action::List,
    Action::Read,
    Action::Create,
    Action::Update,
    Action::Destroy,
];

/// Declarative config plus the behaviour that cannot be written as JSON.
#[derive(Clone, Default)]
pub struct ResourceDefinition {
    pub config: ResourceConfig,
    validate: Option<Predicate>,
    after_create: Option<Hook>,
    after_update: Option<Hook>,
    responders: HashMap<Action, Arc<dyn Responder>>,
}

impl ResourceDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ResourceConfig) -> Self {
        ResourceDefinition {
            config,
            ..Default::default()
        }
    }

    pub fn many(mut self, relation: impl Into<String>) -> Self {
        self.config.relations.many.push(relation.into());
        self
    }

    pub fn one(mut self, relation: impl Into<String>) -> Self {
        self.config.relations.one.push(relation.into());
        self
    }

    pub fn many_to_many(mut self, relation: impl Into<String>, pivot: impl Into<String>) -> Self {
        self.config
            .relations
            .many_to_many
            .insert(relation.into(), pivot.into());
        self
    }

    pub fn allow_forced_ids(mut self, allow: bool) -> Self {
        self.config.allow_forced_ids = Some(allow);
        self
    }

    pub fn destructive(mut self, destructive: bool) -> Self {
        self.config.destructive = Some(destructive);
        self
    }

    pub fn db(mut self, db: DbConfig) -> Self {
        self.config.db = db;
        self
    }

    pub fn base(mut self, base: impl Into<String>) -> Self {
        self.config.base = Some(base.into());
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = Some(ms);
        self
    }

    pub fn rule(mut self, field: impl Into<String>, rule: ValidationRule) -> Self {
        self.config.validation.insert(field.into(), rule);
        self
    }

    pub fn validate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(predicate));
        self
    }

    pub fn after_create<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Record) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.after_create = Some(Arc::new(hook));
        self
    }

    pub fn after_update<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Record) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.after_update = Some(Arc::new(hook));
        self
    }

    /// Response adapter for one action. Unset actions use [`JsonEnvelope`].
    pub fn responder(mut self, action: Action, responder: impl Responder + 'static) -> Self {
        self.responders.insert(action, Arc::new(responder));
        self
    }

    /// The same adapter for every action.
    pub fn respond_with(mut self, responder: impl Responder + 'static) -> Self {
        let responder: Arc<dyn Responder> = Arc::new(responder);
        for action in ACTIONS {
            self.responders.insert(action, responder.clone());
        }
        self
    }

    pub(crate) fn responder_for(&self, action: Action) -> Arc<dyn Responder> {
        self.responders
            .get(&action)
            .cloned()
            .unwrap_or_else(|| Arc::new(JsonEnvelope))
    }

    pub(crate) fn into_context(self, resource: ResolvedResource, store: Store) -> ResourceContext {
        ResourceContext {
            resource,
            store,
            validate: self.validate,
            after_create: self.after_create,
            after_update: self.after_update,
        }
    }
}

impl std::fmt::Debug for ResourceDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDefinition")
            .field("config", &self.config)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// Resolved resource, its primary store and its behaviour. Shared by every route of the resource.
pub struct ResourceContext {
    pub resource: ResolvedResource,
    pub store: Store,
    validate: Option<Predicate>,
    after_create: Option<Hook>,
    after_update: Option<Hook>,
}

impl ResourceContext {
    /// Validation gate: declarative rules, then the user predicate. `partial` checks only present fields.
    pub fn check(&self, record: &Record, partial: bool) -> Result<(), AppError> {
        if partial {
            RequestValidator::validate_partial(record, &self.resource.validation)?;
        } else {
            RequestValidator::validate(record, &self.resource.validation)?;
        }
        match &self.validate {
            Some(predicate) if !predicate(record) => Err(AppError::ValidationFailure(format!(
                "{} rejected by validator",
                self.resource.name
            ))),
            _ => Ok(()),
        }
    }

    pub fn after_create(&self, record: &Record) {
        self.run_hook("after_create", self.after_create.as_ref(), record);
    }

    pub fn after_update(&self, record: &Record) {
        self.run_hook("after_update", self.after_update.as_ref(), record);
    }

    fn run_hook(&self, hook_name: &'static str, hook: Option<&Hook>, record: &Record) {
        if let Some(hook) = hook {
            if let Err(e) = hook(record) {
                tracing::warn!(resource = %self.resource.name, hook = hook_name, error = %e, "hook failed");
            }
        }
    }
}

/// A resource bound to its stores. Yields the full route set for itself and its relations.
pub struct Resource {
    ctx: Arc<ResourceContext>,
    many: Vec<Arc<Relation>>,
    one: Vec<Arc<Relation>>,
    pivots: Vec<Arc<PivotBinding>>,
    responders: HashMap<Action, Arc<dyn Responder>>,
}

impl Resource {
    /// Opens (or reuses) one store per collection the resource touches. Relation
    /// and pivot collections live in the owner's database.
    pub(crate) fn build(
        resolved: ResolvedResource,
        def: ResourceDefinition,
        stores: &mut StoreCache,
    ) -> Result<Self, ConfigError> {
        let db = resolved.db.clone();
        let primary = stores.open(&db, &resolved.plural)?;
        let responders = ACTIONS
            .into_iter()
            .map(|action| (action, def.responder_for(action)))
            .collect();
        let (many_names, one_names, pivot_names) =
            (resolved.many.clone(), resolved.one.clone(), resolved.many_to_many.clone());
        let ctx = Arc::new(def.into_context(resolved, primary));

        let mut relation = |name: String| -> Result<Arc<Relation>, ConfigError> {
            let store = stores.open(&db, &pluralize(&name))?;
            Ok(Arc::new(Relation {
                owner: ctx.clone(),
                name,
                store,
            }))
        };
        let many = many_names
            .into_iter()
            .map(&mut relation)
            .collect::<Result<Vec<_>, _>>()?;
        let one = one_names
            .into_iter()
            .map(&mut relation)
            .collect::<Result<Vec<_>, _>>()?;

        let mut pivots = Vec::with_capacity(pivot_names.len());
        for p in pivot_names {
            pivots.push(Arc::new(PivotBinding {
                owner: ctx.clone(),
                related: stores.open(&db, &pluralize(&p.relation))?,
                pivot: stores.open(&db, &pluralize(&p.pivot))?,
                relation: p.relation,
            }));
        }

        Ok(Resource {
            ctx,
            many,
            one,
            pivots,
            responders,
        })
    }

    pub fn name(&self) -> &str {
        &self.ctx.resource.name
    }

    pub fn store(&self) -> &Store {
        &self.ctx.store
    }

    fn route(&self, method: Method, path: String, action: Action, handler: Handler) -> Route {
        let responder = self
            .responders
            .get(&action)
            .cloned()
            .unwrap_or_else(|| Arc::new(JsonEnvelope));
        Route {
            method,
            path,
            action,
            handler,
            responder,
            timeout: self.ctx.resource.timeout,
        }
    }

    /// Routes in a fixed order: primary, one-to-many, one-to-one, many-to-many,
    /// each relation group in declaration order.
    pub fn routes(&self) -> Vec<Route> {
        let resolved = &self.ctx.resource;
        let item = resolved.item_prefix();
        let by_id = format!("{}/:id", item);
        let ctx = &self.ctx;
        let mut routes = vec![self.route(Method::POST, item.clone(), Action::Create, primary::create(ctx.clone(), false))];
        if resolved.allow_forced_ids {
            routes.push(self.route(Method::POST, by_id.clone(), Action::Create, primary::create(ctx.clone(), true)));
        }
        routes.push(self.route(Method::GET, by_id.clone(), Action::Read, primary::read(ctx.clone())));
        routes.push(self.route(Method::PUT, by_id.clone(), Action::Update, primary::update(ctx.clone())));
        routes.push(self.route(Method::DELETE, by_id.clone(), Action::Destroy, primary::destroy(ctx.clone())));
        routes.push(self.route(Method::GET, resolved.list_path(), Action::List, primary::list(ctx.clone())));

        for rel in &self.many {
            let single = format!("{}/{}", by_id, rel.name);
            let child = format!("{}/:{}", single, crate::config::foreign_key(&rel.name));
            routes.push(self.route(Method::POST, single, Action::Create, many::create(rel.clone())));
            routes.push(self.route(Method::GET, child.clone(), Action::Read, many::read(rel.clone())));
            routes.push(self.route(Method::PUT, child.clone(), Action::Update, many::update(rel.clone())));
            routes.push(self.route(Method::DELETE, child, Action::Destroy, many::destroy(rel.clone())));
            routes.push(self.route(
                Method::GET,
                format!("{}/{}", by_id, pluralize(&rel.name)),
                Action::List,
                many::list(rel.clone()),
            ));
        }

        for rel in &self.one {
            routes.push(self.route(
                Method::GET,
                format!("{}/{}", by_id, rel.name),
                Action::Read,
                one::read(rel.clone()),
            ));
        }

        for binding in &self.pivots {
            let single = format!("{}/{}", by_id, binding.relation);
            let linked = format!("{}/:{}", single, crate::config::foreign_key(&binding.relation));
            routes.push(self.route(Method::POST, single, Action::Create, pivot::associate(binding.clone(), false)));
            routes.push(self.route(Method::POST, linked, Action::Create, pivot::associate(binding.clone(), true)));
            routes.push(self.route(
                Method::GET,
                format!("{}/{}", by_id, pluralize(&binding.relation)),
                Action::List,
                pivot::list(binding.clone()),
            ));
        }
        routes
    }
}
