//! Domain error kinds shared by all crates.
//!
//! Each variant maps to one machine-readable error name and one HTTP status;
//! the mapping itself lives in the API crate so this crate stays free of
//! HTTP types.

use thiserror::Error;

/// A single invalid field in a validation failure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Domain-level error for the provenance service.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Input violated the request schema or a domain constraint.
    #[error("{detail}")]
    Validation {
        detail: String,
        fields: Vec<FieldError>,
    },

    /// A file or body exceeded its configured size limit.
    #[error("{0}")]
    InputTooLarge(String),

    /// A fixed-window bucket limit was exceeded.
    #[error("rate limit exceeded, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    /// The client's daily point budget is exhausted.
    #[error("daily spend cap reached, retry after {retry_after_seconds}s")]
    SpendCapExceeded { retry_after_seconds: u64 },

    /// Missing or invalid API key.
    #[error("{0}")]
    Unauthenticated(String),

    /// The internal detector hard-faulted; the request cannot be served.
    #[error("internal detector unavailable: {0}")]
    DetectorUnavailable(String),

    /// Lookup by id found nothing.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// A durable write failed and the operation cannot be trusted.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Anything unexpected.
    #[error("{0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for a validation failure without a per-field breakdown.
    pub fn validation(detail: impl Into<String>) -> Self {
        CoreError::Validation {
            detail: detail.into(),
            fields: Vec::new(),
        }
    }

    /// Machine-readable error name carried in the error envelope.
    pub fn name(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "ValidationFailed",
            CoreError::InputTooLarge(_) => "InputTooLarge",
            CoreError::RateLimited { .. } => "RateLimited",
            CoreError::SpendCapExceeded { .. } => "SpendCapExceeded",
            CoreError::Unauthenticated(_) => "Unauthenticated",
            CoreError::DetectorUnavailable(_) => "DetectorUnavailable",
            CoreError::NotFound { .. } => "NotFound",
            CoreError::Persistence(_) => "PersistenceFailed",
            CoreError::Internal(_) => "InternalError",
        }
    }
}
