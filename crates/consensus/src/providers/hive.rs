//! Hive adapter: external multimodal detector with a class-list response
//! schema.

use std::time::Duration;

use async_trait::async_trait;
use provtrack_core::types::ContentType;
use serde_json::{json, Value};

use crate::provider::{ProbeOutcome, ProbeRequest, Provider};

use super::{first_path_probability, path_value, request_id_header, send_with_retry};

const DIRECT_PATHS: [&str; 6] = [
    "score",
    "ai_probability",
    "result.score",
    "result.ai_probability",
    "output.score",
    "output.ai_probability",
];

/// Hive's task-style schema nests scored classes under the first output.
const CLASS_LIST_PATH: &str = "status.0.response.output.0.classes";

pub struct HiveProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    weight: f64,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl HiveProvider {
    pub fn new(
        client: reqwest::Client,
        api_url: String,
        api_key: Option<String>,
        weight: f64,
        retry_attempts: u32,
        retry_backoff: Duration,
    ) -> Self {
        Self {
            client,
            api_url,
            api_key,
            weight,
            retry_attempts,
            retry_backoff,
        }
    }
}

/// Highest score among classes whose label names a synthetic-content
/// category.
fn class_list_score(classes: &Value) -> Option<f64> {
    let classes = classes.as_array()?;
    classes
        .iter()
        .filter_map(|item| {
            let label = item.get("class")?.as_str()?.to_lowercase();
            if !label.contains("ai") && !label.contains("synthetic") && !label.contains("deepfake")
            {
                return None;
            }
            item.get("score")?.as_f64()
        })
        .fold(None, |best, score| match best {
            Some(current) if current >= score => Some(current),
            _ => Some(score),
        })
}

#[async_trait]
impl Provider for HiveProvider {
    fn name(&self) -> &'static str {
        "hive"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn probe(&self, request: &ProbeRequest<'_>) -> ProbeOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return ProbeOutcome::Unavailable("missing Hive API key".to_string());
        };

        let is_text = request.content_type == ContentType::Text;
        if is_text && request.text.is_none() {
            return ProbeOutcome::Unsupported("no text payload provided".to_string());
        }
        if !is_text && request.binary.is_none() {
            return ProbeOutcome::Unsupported("no binary payload provided".to_string());
        }

        let response = send_with_retry(
            || {
                let builder = self
                    .client
                    .post(&self.api_url)
                    .header("Authorization", format!("Token {api_key}"));
                if let Some(text) = request.text {
                    builder.json(&json!({ "input": { "text": text } }))
                } else {
                    let data = request.binary.unwrap_or_default().to_vec();
                    let filename = request
                        .filename
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{}.bin", request.content_type));
                    let form = reqwest::multipart::Form::new()
                        .text("modality", request.content_type.as_str())
                        .part(
                            "media",
                            reqwest::multipart::Part::bytes(data).file_name(filename),
                        );
                    builder.multipart(form)
                }
            },
            self.retry_attempts,
            self.retry_backoff,
        )
        .await;

        let response = match response {
            Ok(response) => response,
            Err(rationale) => {
                return ProbeOutcome::Error {
                    rationale,
                    evidence_ref: None,
                }
            }
        };

        let evidence_ref = request_id_header(&response);
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return ProbeOutcome::Error {
                rationale: format!("HTTP {}", status.as_u16()),
                evidence_ref,
            };
        }

        let payload: Value = match response.json().await {
            Ok(payload) => payload,
            Err(err) => {
                return ProbeOutcome::Error {
                    rationale: format!("invalid JSON response: {err}"),
                    evidence_ref,
                }
            }
        };

        if let Some((probability, path)) = first_path_probability(&payload, &DIRECT_PATHS) {
            return ProbeOutcome::Ok {
                probability,
                rationale: format!("External multimodal detector vote ({path})."),
                evidence_ref,
            };
        }
        if let Some(probability) = path_value(&payload, CLASS_LIST_PATH).and_then(class_list_score)
        {
            return ProbeOutcome::Ok {
                probability,
                rationale: format!("External multimodal detector vote ({CLASS_LIST_PATH})."),
                evidence_ref,
            };
        }

        let keys: Vec<&str> = payload
            .as_object()
            .map(|o| o.keys().map(String::as_str).collect())
            .unwrap_or_default();
        ProbeOutcome::Error {
            rationale: format!("unsupported response schema: top-level keys={keys:?}"),
            evidence_ref,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_list_takes_the_best_matching_label() {
        let payload = json!({"status": [{"response": {"output": [{"classes": [
            {"class": "not_ai_generated", "score": 0.95},
            {"class": "ai_generated", "score": 0.31},
            {"class": "deepfake", "score": 0.44},
        ]}]}}]});
        let classes = path_value(&payload, CLASS_LIST_PATH).unwrap();
        // "not_ai_generated" also contains "ai", and its score dominates.
        assert_eq!(class_list_score(classes), Some(0.95));
    }

    #[test]
    fn class_list_ignores_unrelated_labels() {
        let classes = json!([
            {"class": "landscape", "score": 0.9},
            {"class": "synthetic_media", "score": 0.2},
        ]);
        assert_eq!(class_list_score(&classes), Some(0.2));
        assert_eq!(class_list_score(&json!([{"class": "cat", "score": 1.0}])), None);
    }

    #[tokio::test]
    async fn missing_credential_is_unavailable() {
        let provider = HiveProvider::new(
            reqwest::Client::new(),
            "http://localhost:1/task".to_string(),
            None,
            0.3,
            1,
            Duration::from_millis(1),
        );
        let request = ProbeRequest::text("sample");
        assert!(matches!(
            provider.probe(&request).await,
            ProbeOutcome::Unavailable(_)
        ));
    }
}
