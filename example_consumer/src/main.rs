//! Example consumer: serves the resources in a JSON definitions file.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Environment: `CONFIG_PATH` (default `example_consumer/resources.json`),
//! `BIND_ADDR` (default `127.0.0.1:3000`), `DATABASE_URL` (switches every
//! resource to the postgres driver when set).

use resource_sdk::{load_definitions, DbConfig, Engine};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_sdk=info,example_consumer=info")),
        )
        .init();

    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "example_consumer/resources.json".into());
    let mut definitions = load_definitions(&config_path).await?;
    if let Ok(url) = std::env::var("DATABASE_URL") {
        definitions.defaults.db = DbConfig {
            driver: Some("postgres".into()),
            url: Some(url),
            ..definitions.defaults.db
        };
    }

    let table = Engine::builder().resources_from(definitions)?.build();
    for store in table.stores() {
        let collection = store.collection().to_string();
        store.on_ready(move |res| match res {
            Ok(()) => tracing::info!(%collection, "store ready"),
            Err(e) => tracing::warn!(%collection, error = %e, "store unavailable"),
        });
    }

    let app = resource_sdk::common_routes_with_ready(table.app_state()).merge(table.into_router());
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
