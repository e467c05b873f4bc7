//! The provider adapter interface.

use async_trait::async_trait;
use provtrack_core::types::ContentType;

/// Artifact view handed to each provider probe.
///
/// Exactly one of `text` / `binary` is populated depending on the modality;
/// providers that need the other representation report `unsupported`.
#[derive(Debug, Clone, Copy)]
pub struct ProbeRequest<'a> {
    pub content_type: ContentType,
    pub text: Option<&'a str>,
    pub binary: Option<&'a [u8]>,
    pub filename: Option<&'a str>,
}

impl<'a> ProbeRequest<'a> {
    pub fn text(text: &'a str) -> Self {
        Self {
            content_type: ContentType::Text,
            text: Some(text),
            binary: None,
            filename: None,
        }
    }

    pub fn binary(content_type: ContentType, data: &'a [u8], filename: &'a str) -> Self {
        Self {
            content_type,
            text: None,
            binary: Some(data),
            filename: Some(filename),
        }
    }
}

/// Terminal result of one probe.
///
/// `Unavailable` covers missing credentials, timeouts, and disabled
/// adapters; `Unsupported` covers modality mismatches; `Error` covers
/// upstream failures after retries. None of these fail the request.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Ok {
        probability: f64,
        rationale: String,
        evidence_ref: Option<String>,
    },
    Unavailable(String),
    Unsupported(String),
    Error {
        rationale: String,
        evidence_ref: Option<String>,
    },
}

/// One external opinion source.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name surfaced in consensus votes.
    fn name(&self) -> &'static str;

    /// Relative weight of this provider's vote.
    fn weight(&self) -> f64;

    /// Probe the artifact. Must never panic; all failure modes map onto
    /// [`ProbeOutcome`] variants.
    async fn probe(&self, request: &ProbeRequest<'_>) -> ProbeOutcome;
}
