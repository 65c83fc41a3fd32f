//! Explicit driver registry: driver name -> factory.

use super::{Driver, MemoryDriver, PostgresDriver};
use crate::config::ResolvedDb;
use crate::error::StoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Builds one driver bound to `collection` from the resolved backend config.
pub type DriverFactory =
    Arc<dyn Fn(&ResolvedDb, &str) -> Result<Arc<dyn Driver>, StoreError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct DriverRegistry {
    factories: HashMap<String, DriverFactory>,
}

impl DriverRegistry {
    /// Empty registry; nothing is available until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `memory` and `postgres` drivers.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("memory", memory_factory);
        registry.register("postgres", postgres_factory());
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ResolvedDb, &str) -> Result<Arc<dyn Driver>, StoreError> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn open(&self, db: &ResolvedDb, collection: &str) -> Result<Arc<dyn Driver>, StoreError> {
        let factory = self
            .factories
            .get(&db.driver)
            .ok_or_else(|| StoreError::UnknownDriver(db.driver.clone()))?;
        tracing::debug!(driver = %db.driver, database = %db.name, collection, "opening driver");
        factory(db, collection)
    }
}

/// Memory collections snapshot to `<path>/<database>/<collection>.json` when a path is set.
fn memory_factory(db: &ResolvedDb, collection: &str) -> Result<Arc<dyn Driver>, StoreError> {
    let driver = match &db.path {
        Some(dir) => {
            let file = dir.join(&db.name).join(format!("{}.json", collection));
            MemoryDriver::with_snapshot(collection, file)?
        }
        None => MemoryDriver::new(collection),
    };
    Ok(Arc::new(driver))
}

/// Postgres collections live in schema `<database>`; pools are shared per URL.
fn postgres_factory() -> impl Fn(&ResolvedDb, &str) -> Result<Arc<dyn Driver>, StoreError> + Send + Sync {
    let pools: Arc<Mutex<HashMap<String, PgPool>>> = Arc::new(Mutex::new(HashMap::new()));
    move |db: &ResolvedDb, collection: &str| {
        let url = db
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Config("postgres driver requires db.url".into()))?;
        let pool = {
            let mut pools = pools
                .lock()
                .map_err(|_| StoreError::Config("postgres pool cache poisoned".into()))?;
            match pools.get(url) {
                Some(pool) => pool.clone(),
                None => {
                    let pool = PgPoolOptions::new()
                        .max_connections(db.max_connections)
                        .connect_lazy(url)?;
                    pools.insert(url.to_string(), pool.clone());
                    pool
                }
            }
        };
        Ok(Arc::new(PostgresDriver::new(pool, db.name.clone(), collection)) as Arc<dyn Driver>)
    }
}
