//! Reality Defender adapter: external multimodal detector.

use std::time::Duration;

use async_trait::async_trait;
use provtrack_core::types::ContentType;
use reqwest::multipart;
use serde_json::json;

use crate::provider::{ProbeOutcome, ProbeRequest, Provider};

use super::{first_path_probability, request_id_header, send_with_retry};

/// Response fields checked for the probability, in priority order.
const SCORE_PATHS: [&str; 6] = [
    "result.score",
    "result.ai_probability",
    "prediction.ai_probability",
    "prediction.score",
    "data.ai_probability",
    "data.score",
];

pub struct RealityDefenderProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    weight: f64,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl RealityDefenderProvider {
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

#[async_trait]
impl Provider for RealityDefenderProvider {
    fn name(&self) -> &'static str {
        "reality_defender"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn probe(&self, request: &ProbeRequest<'_>) -> ProbeOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return ProbeOutcome::Unavailable("missing Reality Defender API key".to_string());
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
                let builder = self.client.post(&self.api_url).bearer_auth(api_key);
                if let Some(text) = request.text {
                    builder.json(&json!({ "modality": "text", "text": text }))
                } else {
                    let data = request.binary.unwrap_or_default().to_vec();
                    let filename = request
                        .filename
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("{}.bin", request.content_type));
                    let form = multipart::Form::new()
                        .text("modality", request.content_type.as_str())
                        .part("file", multipart::Part::bytes(data).file_name(filename));
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
            let label = if status.as_u16() == 429 {
                "rate_limited"
            } else {
                "error"
            };
            return ProbeOutcome::Error {
                rationale: format!("{label}: HTTP {}", status.as_u16()),
                evidence_ref,
            };
        }

        let payload: serde_json::Value = match response.json().await {
            Ok(payload) => payload,
            Err(err) => {
                return ProbeOutcome::Error {
                    rationale: format!("invalid JSON response: {err}"),
                    evidence_ref,
                }
            }
        };

        match first_path_probability(&payload, &SCORE_PATHS) {
            Some((probability, path)) => ProbeOutcome::Ok {
                probability,
                rationale: format!("External multimodal detector vote ({path})."),
                evidence_ref,
            },
            None => {
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
    }
}
