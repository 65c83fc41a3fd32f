//! Builder that turns resource definitions into an immutable [`RouteTable`].

use crate::config::{resolve, resolve_db, DbConfig, Defaults, DefinitionsFile, ResolvedDb};
use crate::driver::DriverRegistry;
use crate::error::{ConfigError, StoreError};
use crate::inflect::pluralize;
use crate::resource::{Resource, ResourceDefinition};
use crate::routes::RouteTable;
use crate::store::Store;
use std::collections::HashMap;

/// One store per `(database, collection)`, shared by every resource that touches it.
pub(crate) struct StoreCache {
    registry: DriverRegistry,
    stores: HashMap<(ResolvedDb, String), Store>,
    opened: Vec<Store>,
}

impl StoreCache {
    fn new(registry: DriverRegistry) -> Self {
        StoreCache {
            registry,
            stores: HashMap::new(),
            opened: Vec::new(),
        }
    }

    pub(crate) fn open(&mut self, db: &ResolvedDb, collection: &str) -> Result<Store, StoreError> {
        let key = (db.clone(), collection.to_string());
        if let Some(store) = self.stores.get(&key) {
            return Ok(store.clone());
        }
        let store = Store::new(self.registry.open(db, collection)?);
        tracing::info!(driver = %db.driver, database = %db.name, collection, "store opened");
        self.stores.insert(key, store.clone());
        self.opened.push(store.clone());
        Ok(store)
    }
}

pub struct Engine;

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder {
            defaults: Defaults::default(),
            stores: StoreCache::new(DriverRegistry::builtin()),
            table: RouteTable::default(),
        }
    }
}

/// Accumulates resources; `build` hands back the finished table. Nothing is global.
pub struct EngineBuilder {
    defaults: Defaults,
    stores: StoreCache,
    table: RouteTable,
}

impl EngineBuilder {
    /// Defaults apply to resources added after this call.
    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Replaces the driver registry. Stores already opened keep their drivers.
    pub fn registry(mut self, registry: DriverRegistry) -> Self {
        self.stores.registry = registry;
        self
    }

    pub fn resource(mut self, name: &str, definition: ResourceDefinition) -> Result<Self, ConfigError> {
        let resolved = resolve(name, &definition.config, &self.defaults)?;
        tracing::info!(resource = %resolved.name, base = %resolved.base, driver = %resolved.db.driver, "building resource");
        let resource = Resource::build(resolved, definition, &mut self.stores)?;
        for route in resource.routes() {
            self.table.push(route)?;
        }
        Ok(self)
    }

    /// Takes the file's defaults, then adds every resource in name order.
    pub fn resources_from(mut self, file: DefinitionsFile) -> Result<Self, ConfigError> {
        self.defaults = file.defaults;
        for (name, config) in file.resources {
            self = self.resource(&name, ResourceDefinition::from_config(config))?;
        }
        Ok(self)
    }

    /// Direct store access outside the generated routes, in the default database.
    /// Shares the store if a resource already uses the same collection.
    pub fn database(&mut self, name: &str) -> Result<Store, ConfigError> {
        self.database_in(name, &DbConfig::default())
    }

    /// As [`database`](Self::database) with `db` merged over the defaults.
    pub fn database_in(&mut self, name: &str, db: &DbConfig) -> Result<Store, ConfigError> {
        let db = resolve_db(db, &self.defaults);
        Ok(self.stores.open(&db, &pluralize(name))?)
    }

    pub fn build(mut self) -> RouteTable {
        for store in self.stores.opened {
            self.table.track_store(store);
        }
        tracing::info!(routes = self.table.len(), "route table built");
        self.table
    }
}
