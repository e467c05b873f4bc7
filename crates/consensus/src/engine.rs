//! Concurrent provider fan-out and vote aggregation.

use std::sync::Arc;
use std::time::Duration;

use provtrack_core::consensus::{self, ConsensusSummary, ConsensusVote, ProbeStatus};
use provtrack_core::error::CoreError;
use provtrack_core::signals::DetectionOutcome;
use provtrack_core::types::ContentType;

use crate::provider::{ProbeOutcome, ProbeRequest, Provider};

/// Per-modality decision thresholds.
#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub text: f64,
    pub image: f64,
    pub audio: f64,
    pub video: f64,
}

impl Thresholds {
    pub fn for_content(&self, content_type: ContentType) -> f64 {
        match content_type {
            ContentType::Text => self.text,
            ContentType::Image => self.image,
            ContentType::Audio => self.audio,
            ContentType::Video => self.video,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            text: 0.5,
            image: 0.5,
            audio: 0.5,
            video: 0.5,
        }
    }
}

/// Fans out to external providers and folds all votes into one summary.
pub struct ConsensusEngine {
    internal_weight: f64,
    enabled: bool,
    provider_timeout: Duration,
    thresholds: Thresholds,
    providers: Vec<Arc<dyn Provider>>,
}

impl ConsensusEngine {
    pub fn new(
        internal_weight: f64,
        enabled: bool,
        provider_timeout: Duration,
        thresholds: Thresholds,
        providers: Vec<Arc<dyn Provider>>,
    ) -> Self {
        Self {
            internal_weight: internal_weight.max(0.0),
            enabled,
            provider_timeout,
            thresholds,
            providers,
        }
    }

    /// Combine the internal detector outcome with external provider votes.
    ///
    /// External probes run concurrently; each gets the same deadline, and a
    /// timeout or failure in one never cancels its peers. The summary lists
    /// the internal vote first, then external votes in configuration order.
    pub async fn score(
        &self,
        internal: &DetectionOutcome,
        request: &ProbeRequest<'_>,
    ) -> Result<ConsensusSummary, CoreError> {
        let mut votes = vec![ConsensusVote::new(
            "internal",
            Some(internal.probability),
            self.internal_weight,
            ProbeStatus::Ok,
            "Local detector probability.",
        )];

        if self.enabled && !self.providers.is_empty() {
            let timeout = self.provider_timeout;
            let probes = self.providers.iter().map(|provider| async move {
                match tokio::time::timeout(timeout, provider.probe(request)).await {
                    Ok(outcome) => outcome,
                    Err(_) => ProbeOutcome::Unavailable(format!(
                        "probe timed out after {}s",
                        timeout.as_secs()
                    )),
                }
            });
            let outcomes = futures::future::join_all(probes).await;
            for (provider, outcome) in self.providers.iter().zip(outcomes) {
                let vote = into_vote(provider.name(), provider.weight(), outcome);
                if vote.status != ProbeStatus::Ok {
                    tracing::debug!(
                        provider = vote.provider,
                        status = vote.status.as_str(),
                        rationale = %vote.rationale,
                        "Provider vote degraded"
                    );
                }
                votes.push(vote);
            }
        }

        let threshold = self.thresholds.for_content(request.content_type);
        consensus::summarize(votes, threshold).ok_or_else(|| {
            CoreError::DetectorUnavailable("no usable provider votes".to_string())
        })
    }
}

fn into_vote(name: &'static str, weight: f64, outcome: ProbeOutcome) -> ConsensusVote {
    match outcome {
        ProbeOutcome::Ok {
            probability,
            rationale,
            evidence_ref,
        } => ConsensusVote::new(name, Some(probability), weight, ProbeStatus::Ok, rationale)
            .with_evidence(evidence_ref),
        ProbeOutcome::Unavailable(rationale) => {
            ConsensusVote::new(name, None, weight, ProbeStatus::Unavailable, rationale)
        }
        ProbeOutcome::Unsupported(rationale) => {
            ConsensusVote::new(name, None, weight, ProbeStatus::Unsupported, rationale)
        }
        ProbeOutcome::Error {
            rationale,
            evidence_ref,
        } => ConsensusVote::new(name, None, weight, ProbeStatus::Error, rationale)
            .with_evidence(evidence_ref),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct FakeProvider {
        name: &'static str,
        weight: f64,
        delay: Duration,
        outcome: ProbeOutcome,
    }

    #[async_trait]
    impl Provider for FakeProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        fn weight(&self) -> f64 {
            self.weight
        }

        async fn probe(&self, _request: &ProbeRequest<'_>) -> ProbeOutcome {
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()
        }
    }

    fn internal_outcome(probability: f64) -> DetectionOutcome {
        DetectionOutcome {
            probability,
            model_prediction: None,
            signals: json!({}),
            explanation: "test".to_string(),
        }
    }

    fn engine_with(providers: Vec<Arc<dyn Provider>>) -> ConsensusEngine {
        ConsensusEngine::new(
            0.6,
            true,
            Duration::from_secs(2),
            Thresholds::default(),
            providers,
        )
    }

    #[tokio::test]
    async fn internal_only_passes_probability_through() {
        let engine = engine_with(vec![]);
        let p = 0.637_219_480_111;
        let request = ProbeRequest::text("sample");
        let summary = engine.score(&internal_outcome(p), &request).await.unwrap();
        assert_eq!(summary.final_probability, p);
        assert_eq!(summary.providers.len(), 1);
        assert_eq!(summary.providers[0].provider, "internal");
        assert_eq!(summary.providers[0].status, ProbeStatus::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_without_failing_the_call() {
        let slow: Arc<dyn Provider> = Arc::new(FakeProvider {
            name: "copyleaks",
            weight: 0.4,
            delay: Duration::from_secs(30),
            outcome: ProbeOutcome::Ok {
                probability: 0.1,
                rationale: "never delivered".into(),
                evidence_ref: None,
            },
        });
        let engine = engine_with(vec![slow]);
        let request = ProbeRequest::text("sample");
        let summary = engine
            .score(&internal_outcome(0.8), &request)
            .await
            .unwrap();

        assert_eq!(summary.final_probability, 0.8);
        let copyleaks = &summary.providers[1];
        assert_eq!(copyleaks.status, ProbeStatus::Unavailable);
        assert!(copyleaks.rationale.contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn one_timeout_does_not_cancel_a_peer_probe() {
        let slow: Arc<dyn Provider> = Arc::new(FakeProvider {
            name: "copyleaks",
            weight: 0.4,
            delay: Duration::from_secs(30),
            outcome: ProbeOutcome::Unavailable("unreachable".into()),
        });
        let fast: Arc<dyn Provider> = Arc::new(FakeProvider {
            name: "hive",
            weight: 0.4,
            delay: Duration::from_millis(10),
            outcome: ProbeOutcome::Ok {
                probability: 0.2,
                rationale: "external vote".into(),
                evidence_ref: None,
            },
        });
        let engine = engine_with(vec![slow, fast]);
        let request = ProbeRequest::text("sample");
        let summary = engine
            .score(&internal_outcome(0.8), &request)
            .await
            .unwrap();

        let expected = (0.8 * 0.6 + 0.2 * 0.4) / 1.0;
        assert!((summary.final_probability - expected).abs() < 1e-9);
        assert_eq!(summary.providers[1].status, ProbeStatus::Unavailable);
        assert_eq!(summary.providers[2].status, ProbeStatus::Ok);
    }

    #[tokio::test]
    async fn disabled_engine_skips_external_providers() {
        let provider: Arc<dyn Provider> = Arc::new(FakeProvider {
            name: "hive",
            weight: 0.4,
            delay: Duration::ZERO,
            outcome: ProbeOutcome::Ok {
                probability: 0.9,
                rationale: "should not be consulted".into(),
                evidence_ref: None,
            },
        });
        let engine = ConsensusEngine::new(
            0.6,
            false,
            Duration::from_secs(2),
            Thresholds::default(),
            vec![provider],
        );
        let request = ProbeRequest::text("sample");
        let summary = engine
            .score(&internal_outcome(0.3), &request)
            .await
            .unwrap();
        assert_eq!(summary.providers.len(), 1);
        assert_eq!(summary.final_probability, 0.3);
    }

    #[tokio::test]
    async fn per_modality_threshold_is_applied() {
        let engine = ConsensusEngine::new(
            0.6,
            true,
            Duration::from_secs(2),
            Thresholds {
                text: 0.9,
                ..Thresholds::default()
            },
            vec![],
        );
        let request = ProbeRequest::text("sample");
        let summary = engine
            .score(&internal_outcome(0.8), &request)
            .await
            .unwrap();
        assert!(!summary.is_ai_generated);
        assert_eq!(summary.threshold, 0.9);
    }
}
