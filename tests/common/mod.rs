#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use async_trait::async_trait;
use resource_sdk::config::ResolvedDb;
use resource_sdk::driver::MemoryDriver;
use resource_sdk::{
    Criteria, DbConfig, Defaults, Driver, DriverRegistry, Engine, Record, ResourceDefinition, RouteTable,
    StoreError, UpdateMode,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub fn table(resources: Vec<(&str, ResourceDefinition)>) -> RouteTable {
    let mut builder = Engine::builder();
    for (name, def) in resources {
        builder = builder.resource(name, def).expect("valid resource");
    }
    builder.build()
}

pub fn app(resources: Vec<(&str, ResourceDefinition)>) -> Router {
    table(resources).into_router()
}

/// Memory driver that sleeps `delay` before every write and yields before every list,
/// so concurrent requests interleave between their reads and writes.
pub struct SlowDriver {
    inner: MemoryDriver,
    delay: Duration,
}

#[async_trait]
impl Driver for SlowDriver {
    fn collection(&self) -> &str {
        self.inner.collection()
    }

    async fn create(&self, record: Record) -> Result<Record, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.create(record).await
    }

    async fn read(&self, id: &str) -> Result<Record, StoreError> {
        self.inner.read(id).await
    }

    async fn update(&self, id: &str, patch: Record, mode: UpdateMode) -> Result<Record, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.update(id, patch, mode).await
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.destroy(id).await
    }

    async fn list(&self, criteria: &Criteria) -> Result<Vec<Record>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.list(criteria).await
    }

    async fn ready(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Like [`app`], with every store backed by a [`SlowDriver`].
pub fn slow_app(delay: Duration, resources: Vec<(&str, ResourceDefinition)>) -> Router {
    let mut registry = DriverRegistry::builtin();
    registry.register("slow", move |_db: &ResolvedDb, collection: &str| {
        Ok(Arc::new(SlowDriver {
            inner: MemoryDriver::new(collection),
            delay,
        }) as Arc<dyn Driver>)
    });
    let mut builder = Engine::builder().registry(registry).defaults(Defaults {
        db: DbConfig {
            driver: Some("slow".into()),
            ..Default::default()
        },
        ..Default::default()
    });
    for (name, def) in resources {
        builder = builder.resource(name, def).expect("valid resource");
    }
    builder.build().into_router()
}

/// Sends one request; returns the status and the parsed JSON body.
pub async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");
    let response = app.clone().oneshot(request).await.expect("infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

/// `response` of a successful envelope.
pub fn ok(status: StatusCode, body: &Value) -> Value {
    assert!(status.is_success(), "{} {}", status, body);
    assert_eq!(body["success"], Value::Bool(true));
    body["response"].clone()
}

pub fn id_of(doc: &Value) -> String {
    doc["_id"].as_str().expect("_id").to_string()
}
