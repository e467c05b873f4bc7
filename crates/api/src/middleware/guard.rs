//! API-key validation plus rate/spend metering.
//!
//! Applied to every `/api/v1` route. The client identity is the API key
//! when present, else the first `X-Forwarded-For` hop. The endpoint path
//! maps onto a logical bucket; the guard backend never sees paths.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use provtrack_core::error::CoreError;
use provtrack_core::ratelimit::Bucket;

use crate::error::AppError;
use crate::state::AppState;

/// Metered client identity, stored as a request extension for handlers
/// and the audit middleware.
#[derive(Debug, Clone)]
pub struct ClientIdentity(pub String);

pub async fn guard(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();

    let api_key = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if state.config.require_api_key {
        let valid = api_key
            .as_deref()
            .is_some_and(|k| state.config.api_keys.iter().any(|known| known == k));
        if !valid {
            return AppError::Core(CoreError::Unauthenticated(
                "Missing or invalid API key".to_string(),
            ))
            .into_response();
        }
    }

    let client_id = api_key
        .or_else(|| forwarded_client(&req))
        .unwrap_or_else(|| "unknown".to_string());

    let bucket = bucket_for_path(&path);
    let cost = cost_for_path(&path, bucket);

    match state.guard.authorize(&client_id, bucket, cost).await {
        Ok(usage) => {
            tracing::info!(
                path,
                client = %truncate(&client_id, 12),
                bucket = bucket.as_str(),
                cost,
                daily_points = usage.day_points,
                "api_usage"
            );
            req.extensions_mut().insert(ClientIdentity(client_id));
            next.run(req).await
        }
        Err(reject) => AppError::from(reject).into_response(),
    }
}

/// First hop of `X-Forwarded-For`, when present.
fn forwarded_client(req: &Request) -> Option<String> {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Map an endpoint path (relative to `/api/v1`) onto its logical bucket.
fn bucket_for_path(path: &str) -> Bucket {
    if path.ends_with("/detect/text") {
        Bucket::Text
    } else if path.contains("/detect/") {
        Bucket::Media
    } else if path.contains("/batch/") {
        Bucket::Batch
    } else if path.contains("/intel/") {
        Bucket::Intel
    } else {
        Bucket::Default
    }
}

/// Spend points for the operation behind a path.
fn cost_for_path(path: &str, bucket: Bucket) -> u32 {
    match bucket {
        Bucket::Text => 1,
        Bucket::Media => {
            if path.ends_with("/audio") {
                4
            } else if path.ends_with("/video") {
                6
            } else {
                // image and url detection
                3
            }
        }
        Bucket::Batch => 5,
        Bucket::Intel => 8,
        Bucket::Default => 1,
    }
}

fn truncate(value: &str, max: usize) -> &str {
    match value.char_indices().nth(max) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_map_onto_their_buckets() {
        assert_eq!(bucket_for_path("/detect/text"), Bucket::Text);
        assert_eq!(bucket_for_path("/detect/image"), Bucket::Media);
        assert_eq!(bucket_for_path("/detect/url"), Bucket::Media);
        assert_eq!(bucket_for_path("/batch/text"), Bucket::Batch);
        assert_eq!(bucket_for_path("/intel/x/collect/estimate"), Bucket::Intel);
        assert_eq!(bucket_for_path("/analyze/history"), Bucket::Default);
    }

    #[test]
    fn costs_follow_the_operation_table() {
        assert_eq!(cost_for_path("/detect/text", Bucket::Text), 1);
        assert_eq!(cost_for_path("/detect/image", Bucket::Media), 3);
        assert_eq!(cost_for_path("/detect/audio", Bucket::Media), 4);
        assert_eq!(cost_for_path("/detect/video", Bucket::Media), 6);
        assert_eq!(cost_for_path("/batch/text", Bucket::Batch), 5);
        assert_eq!(cost_for_path("/intel/x/collect/estimate", Bucket::Intel), 8);
    }
}
