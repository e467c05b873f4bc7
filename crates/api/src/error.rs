//! Application error type and HTTP mapping.
//!
//! [`AppError::into_response`] produces a minimal JSON body plus an
//! [`ErrorParts`] response extension; the envelope middleware later
//! rewrites the body into the full error envelope with the request id and
//! path, which `IntoResponse` cannot see.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use provtrack_core::error::CoreError;
use provtrack_core::ratelimit::Reject;
use serde_json::{json, Value};

/// Machine-readable error name + detail, attached to error responses so
/// the envelope middleware can build the final body.
#[derive(Debug, Clone)]
pub struct ErrorParts {
    pub error: &'static str,
    pub detail: Value,
}

/// Application-level error for HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `provtrack-core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<Reject> for AppError {
    fn from(reject: Reject) -> Self {
        match reject {
            Reject::RateLimited {
                retry_after_seconds,
            } => AppError::Core(CoreError::RateLimited {
                retry_after_seconds,
            }),
            Reject::SpendCapExceeded {
                retry_after_seconds,
            } => AppError::Core(CoreError::SpendCapExceeded {
                retry_after_seconds,
            }),
        }
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, Value, Option<u64>) {
        match self {
            AppError::Core(core) => match core {
                CoreError::Validation { detail, fields } => {
                    let detail = if fields.is_empty() {
                        json!(detail)
                    } else {
                        json!(fields)
                    };
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        core.name(),
                        detail,
                        None,
                    )
                }
                CoreError::InputTooLarge(msg) => (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    core.name(),
                    json!(msg),
                    None,
                ),
                CoreError::RateLimited {
                    retry_after_seconds,
                } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    core.name(),
                    json!("Rate limit exceeded. Please try again later."),
                    Some(*retry_after_seconds),
                ),
                CoreError::SpendCapExceeded {
                    retry_after_seconds,
                } => (
                    StatusCode::TOO_MANY_REQUESTS,
                    core.name(),
                    json!(
                        "Daily spend cap reached for this client. \
                         Try again tomorrow or reduce heavy endpoint usage."
                    ),
                    Some(*retry_after_seconds),
                ),
                CoreError::Unauthenticated(msg) => {
                    (StatusCode::UNAUTHORIZED, core.name(), json!(msg), None)
                }
                CoreError::DetectorUnavailable(msg) => {
                    tracing::error!(error = %msg, "Internal detector unavailable");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        core.name(),
                        json!("The internal detector is unavailable."),
                        None,
                    )
                }
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    core.name(),
                    json!(format!("{entity} {id} not found")),
                    None,
                ),
                CoreError::Persistence(msg) => {
                    tracing::error!(error = %msg, "Persistence failure");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        core.name(),
                        json!("Failed to persist the result."),
                        None,
                    )
                }
                CoreError::Internal(msg) => {
                    tracing::error!(error = %msg, "Internal core error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        core.name(),
                        json!("An internal error occurred."),
                        None,
                    )
                }
            },

            AppError::Database(err) => match err {
                sqlx::Error::RowNotFound => (
                    StatusCode::NOT_FOUND,
                    "NotFound",
                    json!("Resource not found"),
                    None,
                ),
                other => {
                    tracing::error!(error = %other, "Database error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "PersistenceFailed",
                        json!("An internal error occurred."),
                        None,
                    )
                }
            },

            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    json!("An internal error occurred."),
                    None,
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, detail, retry_after) = self.parts();

        let body = json!({
            "error": error,
            "detail": detail.clone(),
            "status_code": status.as_u16(),
        });
        let mut response = (status, axum::Json(body)).into_response();
        response.extensions_mut().insert(ErrorParts { error, detail });
        if let Some(seconds) = retry_after {
            if let Ok(value) = seconds.to_string().parse() {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}
