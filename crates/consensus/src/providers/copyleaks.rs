//! Copyleaks adapter: external text detector.

use std::time::Duration;

use async_trait::async_trait;
use provtrack_core::types::ContentType;
use serde_json::json;

use crate::provider::{ProbeOutcome, ProbeRequest, Provider};

use super::{extract_probability, request_id_header, send_with_retry};

pub struct CopyleaksProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    weight: f64,
    retry_attempts: u32,
    retry_backoff: Duration,
}

impl CopyleaksProvider {
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
impl Provider for CopyleaksProvider {
    fn name(&self) -> &'static str {
        "copyleaks"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn probe(&self, request: &ProbeRequest<'_>) -> ProbeOutcome {
        if request.content_type != ContentType::Text {
            return ProbeOutcome::Unsupported(
                "Copyleaks adapter is enabled for text content only.".to_string(),
            );
        }
        let Some(api_key) = self.api_key.as_deref() else {
            return ProbeOutcome::Unavailable("missing Copyleaks API key".to_string());
        };
        let Some(text) = request.text else {
            return ProbeOutcome::Unsupported("no text payload provided".to_string());
        };

        let response = send_with_retry(
            || {
                self.client
                    .post(&self.api_url)
                    .bearer_auth(api_key)
                    .json(&json!({ "text": text }))
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

        let payload: serde_json::Value = match response.json().await {
            Ok(payload) => payload,
            Err(err) => {
                return ProbeOutcome::Error {
                    rationale: format!("invalid JSON response: {err}"),
                    evidence_ref,
                }
            }
        };

        match extract_probability(&payload) {
            Some(probability) => ProbeOutcome::Ok {
                probability,
                rationale: "External text detector vote.".to_string(),
                evidence_ref,
            },
            None => ProbeOutcome::Error {
                rationale: "missing probability field in provider response".to_string(),
                evidence_ref,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(api_key: Option<&str>) -> CopyleaksProvider {
        CopyleaksProvider::new(
            reqwest::Client::new(),
            "http://localhost:1/score".to_string(),
            api_key.map(str::to_string),
            0.4,
            1,
            Duration::from_millis(1),
        )
    }

    #[tokio::test]
    async fn non_text_modalities_are_unsupported() {
        let request = ProbeRequest::binary(ContentType::Image, b"bytes", "a.png");
        let outcome = provider(Some("key")).probe(&request).await;
        assert!(matches!(outcome, ProbeOutcome::Unsupported(_)));
    }

    #[tokio::test]
    async fn missing_credential_is_unavailable() {
        let request = ProbeRequest::text("sample");
        let outcome = provider(None).probe(&request).await;
        assert!(matches!(outcome, ProbeOutcome::Unavailable(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error_vote() {
        let request = ProbeRequest::text("sample");
        let outcome = provider(Some("key")).probe(&request).await;
        match outcome {
            ProbeOutcome::Error { rationale, .. } => {
                assert!(rationale.contains("HTTP error"), "got: {rationale}")
            }
            other => panic!("expected Error, got {other:?}"),
        }
    }
}
