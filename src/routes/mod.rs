//! Route table, axum adapter and common routes.

pub mod common;
pub mod resource;
mod table;

pub use common::{common_routes, common_routes_with_ready};
pub use resource::resource_routes;
pub use table::{Action, Handler, Route, RouteRequest, RouteTable};
