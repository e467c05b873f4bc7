//! External provider adapters.
//!
//! Each adapter validates its own preconditions (credential present,
//! modality supported, payload available) and reports precondition failures
//! through [`ProbeOutcome`](crate::ProbeOutcome) instead of erroring, so a
//! misconfigured provider degrades the consensus rather than the request.

pub mod c2pa;
pub mod copyleaks;
pub mod hive;
pub mod reality_defender;

pub use c2pa::C2paProvider;
pub use copyleaks::CopyleaksProvider;
pub use hive::HiveProvider;
pub use reality_defender::RealityDefenderProvider;

use std::time::Duration;

use serde_json::Value;

/// POST with bounded retries on transport errors and 5xx responses.
///
/// `build` recreates the request for every attempt because multipart bodies
/// cannot be cloned. Backoff grows linearly with the attempt number; the
/// engine-level deadline bounds the whole loop.
pub(crate) async fn send_with_retry<F>(
    build: F,
    attempts: u32,
    backoff: Duration,
) -> Result<reqwest::Response, String>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let attempts = attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match build().send().await {
            Ok(response) => {
                if response.status().is_server_error() && attempt < attempts {
                    last_error = format!("HTTP {}", response.status().as_u16());
                    tokio::time::sleep(backoff * attempt).await;
                    continue;
                }
                return Ok(response);
            }
            Err(err) => {
                last_error = format!("HTTP error: {err}");
                if attempt < attempts {
                    tokio::time::sleep(backoff * attempt).await;
                    continue;
                }
            }
        }
    }

    Err(last_error)
}

/// Upstream correlation id, when the provider returns one.
pub(crate) fn request_id_header(response: &reqwest::Response) -> Option<String> {
    for key in ["x-request-id", "request-id", "x-correlation-id"] {
        if let Some(value) = response.headers().get(key) {
            if let Ok(value) = value.to_str() {
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Walk a dotted path through objects and arrays (`"status.0.response"`).
pub(crate) fn path_value<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let mut node = payload;
    for key in path.split('.') {
        node = match node {
            Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
            Value::Object(map) => map.get(key)?,
            _ => return None,
        };
    }
    Some(node)
}

/// Best-effort probability extraction across common response shapes.
pub(crate) fn extract_probability(payload: &Value) -> Option<f64> {
    let object = payload.as_object()?;

    for key in ["probability", "ai_probability", "score", "confidence"] {
        if let Some(value) = object.get(key).and_then(Value::as_f64) {
            return Some(value);
        }
    }
    for key in ["result", "data", "prediction"] {
        if let Some(nested) = object.get(key) {
            if let Some(value) = extract_probability(nested) {
                return Some(value);
            }
        }
    }
    None
}

/// First numeric value among the listed dotted paths, with the path that
/// produced it (used in vote rationales).
pub(crate) fn first_path_probability<'a>(
    payload: &Value,
    paths: &[&'a str],
) -> Option<(f64, &'a str)> {
    paths.iter().find_map(|path| {
        path_value(payload, path)
            .and_then(Value::as_f64)
            .map(|v| (v, *path))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_value_walks_objects_and_arrays() {
        let payload = json!({"status": [{"response": {"output": [{"score": 0.9}]}}]});
        let value = path_value(&payload, "status.0.response.output.0.score").unwrap();
        assert_eq!(value.as_f64(), Some(0.9));
        assert!(path_value(&payload, "status.1.response").is_none());
        assert!(path_value(&payload, "status.x").is_none());
    }

    #[test]
    fn extract_probability_checks_direct_then_nested_keys() {
        assert_eq!(extract_probability(&json!({"score": 0.4})), Some(0.4));
        assert_eq!(
            extract_probability(&json!({"result": {"ai_probability": 0.7}})),
            Some(0.7)
        );
        assert_eq!(extract_probability(&json!({"message": "no numbers"})), None);
        assert_eq!(extract_probability(&json!("not an object")), None);
    }

    #[test]
    fn first_path_probability_reports_the_matching_path() {
        let payload = json!({"prediction": {"score": 0.25}});
        let (value, path) =
            first_path_probability(&payload, &["result.score", "prediction.score"]).unwrap();
        assert_eq!(value, 0.25);
        assert_eq!(path, "prediction.score");
    }
}
