//! Parameterized SQL for the PostgreSQL document driver.

pub mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
