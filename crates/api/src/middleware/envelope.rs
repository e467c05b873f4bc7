//! Error envelope rewriter.
//!
//! Every 4xx/5xx response leaving the API carries the same JSON shape:
//! `{ error, detail, status_code, request_id, path }`. Handlers attach
//! [`ErrorParts`] via `AppError`; responses produced elsewhere (router
//! 404s, timeouts, panic recovery) get a synthesized envelope from the
//! status phrase.

use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::ErrorParts;

pub async fn envelope_errors(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let mut response = next.run(req).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (error, detail) = match response.extensions_mut().remove::<ErrorParts>() {
        Some(parts) => (parts.error.to_string(), parts.detail),
        None => (
            status_phrase(status).to_string(),
            json!(status.canonical_reason().unwrap_or("Unexpected error")),
        ),
    };

    let body = json!({
        "error": error,
        "detail": detail,
        "status_code": status.as_u16(),
        "request_id": request_id,
        "path": path,
    });

    let mut enveloped = (status, axum::Json(body)).into_response();
    // Carry over headers set by the original response (Retry-After and
    // friends), letting the new body headers win.
    for (name, value) in response.headers() {
        if name != CONTENT_TYPE && name != CONTENT_LENGTH {
            enveloped.headers_mut().insert(name.clone(), value.clone());
        }
    }
    enveloped
}

/// Machine-readable names for responses that bypassed `AppError`.
fn status_phrase(status: StatusCode) -> &'static str {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => "ValidationFailed",
        StatusCode::UNAUTHORIZED => "Unauthenticated",
        StatusCode::NOT_FOUND => "NotFound",
        StatusCode::METHOD_NOT_ALLOWED => "MethodNotAllowed",
        StatusCode::REQUEST_TIMEOUT => "RequestTimeout",
        StatusCode::PAYLOAD_TOO_LARGE => "InputTooLarge",
        StatusCode::TOO_MANY_REQUESTS => "RateLimited",
        StatusCode::SERVICE_UNAVAILABLE => "DetectorUnavailable",
        _ => "InternalError",
    }
}
