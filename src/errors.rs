use sea_orm::error::DbErr;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Service-level error taxonomy.
///
/// Every validation failure aborts the whole request before any persistent
/// mutation commits; callers receive a stable kind plus a human-readable
/// message. The only errors that are swallowed are notification dispatch
/// failures, which are logged at the call site and otherwise ignored.
#[derive(Error, Debug, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl ServiceError {
    /// Stable, machine-readable kind for the error, independent of the
    /// formatted message.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::DatabaseError(_) => "database_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::BadRequest(_) => "bad_request",
            ServiceError::ValidationError(_) => "validation_error",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::InsufficientStock(_) => "insufficient_stock",
            ServiceError::InvalidOperation(_) => "invalid_operation",
            ServiceError::ConcurrentModification(_) => "concurrent_modification",
            ServiceError::EventError(_) => "event_error",
            ServiceError::InternalError(_) => "internal_error",
            ServiceError::Other(_) => "internal_error",
        }
    }

    /// True for errors caused by the caller rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServiceError::NotFound(_)
                | ServiceError::BadRequest(_)
                | ServiceError::ValidationError(_)
                | ServiceError::Conflict(_)
                | ServiceError::Forbidden(_)
                | ServiceError::InsufficientStock(_)
                | ServiceError::InvalidOperation(_)
        )
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}
