//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and the
//! translation of domain errors into HTTP responses.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bitacora_core::export::ExportError;
use bitacora_core::fleet::{FleetError, ValidationError};
use bitacora_core::identity::AuthError;
use bitacora_core::logbook::LifecycleError;
use bitacora_core::ports::PortError;
use bitacora_core::workflow::WorkflowError;
use serde_json::{json, Value};
use tracing::error;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failed schema migration at startup.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// HTTP Error Responses
//=========================================================================================

/// A handler failure: a status code and a JSON `{ "error": ... }` body.
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub body: Value,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": message.into() }),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "No autenticado")
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<PortError> for HttpError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(what) => Self::new(StatusCode::NOT_FOUND, what),
            PortError::Conflict(what) => Self::new(StatusCode::CONFLICT, what),
            PortError::Unauthorized => Self::unauthorized(),
            PortError::Unexpected(message) => {
                error!("Backend failure: {}", message);
                Self::new(
                    StatusCode::BAD_GATEWAY,
                    "El servicio de datos no respondió. Intenta de nuevo.",
                )
            }
        }
    }
}

impl From<WorkflowError> for HttpError {
    fn from(e: WorkflowError) -> Self {
        if e.is_validation() {
            return Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string());
        }
        match e {
            WorkflowError::Backend(port) => port.into(),
            WorkflowError::AdminOnly(_) => Self::new(StatusCode::FORBIDDEN, e.to_string()),
            WorkflowError::Lifecycle(ref lifecycle) => {
                let status = match lifecycle {
                    LifecycleError::Forbidden { .. } => StatusCode::FORBIDDEN,
                    LifecycleError::NotVisible => StatusCode::NOT_FOUND,
                    _ => StatusCode::CONFLICT,
                };
                Self::new(status, e.to_string())
            }
        }
    }
}

impl From<AuthError> for HttpError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::UnknownAccount | AuthError::WrongPassword => {
                Self::new(StatusCode::UNAUTHORIZED, e.to_string())
            }
            AuthError::AlreadyRegistered => Self::new(StatusCode::CONFLICT, e.to_string()),
            AuthError::Invalid(_) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            AuthError::Backend(port) => port.into(),
        }
    }
}

impl From<FleetError> for HttpError {
    fn from(e: FleetError) -> Self {
        match e {
            FleetError::Validation(ValidationError::Address(ref errors)) => Self {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                body: json!({ "error": e.to_string(), "fields": errors.0 }),
            },
            FleetError::Validation(_) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            FleetError::Forbidden(_) => Self::new(StatusCode::FORBIDDEN, e.to_string()),
            FleetError::Profile(auth) => auth.into(),
            FleetError::Backend(port) => port.into(),
        }
    }
}

impl From<ExportError> for HttpError {
    fn from(e: ExportError) -> Self {
        error!("Export failed: {}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}
