//! Request-level operations over stores: primary CRUD, relations, validation.

mod crud;
mod relations;
mod validation;
pub use crud::CrudService;
pub use relations::{PivotBinding, Relation, RelationService};
pub use validation::RequestValidator;
