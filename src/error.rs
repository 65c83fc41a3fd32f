//! Typed errors and HTTP mapping.

use crate::response::error_body;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by drivers and the store facade.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("{collection}/{id} already exists")]
    IdentityConflict { collection: String, id: String },
    #[error("unknown driver: {0}")]
    UnknownDriver(String),
    #[error("driver config: {0}")]
    Config(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(collection: &str, id: &str) -> Self {
        StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub fn conflict(collection: &str, id: &str) -> Self {
        StoreError::IdentityConflict {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// Errors raised while turning resource configuration into routes.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate route: {method} {path}")]
    DuplicateRoute { method: String, path: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error(transparent)]
    Driver(#[from] StoreError),
}

/// Per-request failure. Every variant resolves the request exactly once.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation failure: {0}")]
    ValidationFailure(String),
    #[error("identity conflict: {0}")]
    IdentityConflict(String),
    #[error("duplicate association: {0}")]
    DuplicateAssociation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage: {0}")]
    Storage(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request abandoned before resolution")]
    Abandoned,
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { .. } => AppError::NotFound(e.to_string()),
            StoreError::IdentityConflict { .. } => AppError::IdentityConflict(e.to_string()),
            other => AppError::Storage(other.to_string()),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::ValidationFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::IdentityConflict(_) => StatusCode::CONFLICT,
            AppError::DuplicateAssociation(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Abandoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(error_body(self.to_string()))).into_response()
    }
}
