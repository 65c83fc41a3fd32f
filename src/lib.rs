//! Resource SDK: REST CRUD and relation routes generated from declarative
//! resource definitions, over pluggable storage drivers.

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod inflect;
pub mod lifecycle;
pub mod resource;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_definitions, parse_definitions, DbConfig, Defaults, DefinitionsFile, ResourceConfig, ValidationRule};
pub use driver::{Criteria, Driver, DriverRegistry, Record, UpdateMode, ID_FIELD};
pub use engine::{Engine, EngineBuilder};
pub use error::{AppError, ConfigError, StoreError};
pub use lifecycle::{Outcome, Resolver};
pub use resource::ResourceDefinition;
pub use response::{error_body, success_body, HtmlEnvelope, JsonEnvelope, Responder};
pub use routes::{common_routes, common_routes_with_ready, resource_routes, Action, Route, RouteTable};
pub use state::AppState;
pub use store::Store;
