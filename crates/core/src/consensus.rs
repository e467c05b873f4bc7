//! Consensus vote types and weighted aggregation.
//!
//! The async fan-out to providers lives in `provtrack-consensus`; this
//! module owns the data model and the math so both the engine and its tests
//! stay deterministic. Aggregation is a weighted mean over `ok` votes,
//! except that a single `ok` vote passes its probability through unchanged.

use serde::{Deserialize, Serialize};

/// Terminal state of one provider probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Ok,
    Unavailable,
    Unsupported,
    Error,
}

impl ProbeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProbeStatus::Ok => "ok",
            ProbeStatus::Unavailable => "unavailable",
            ProbeStatus::Unsupported => "unsupported",
            ProbeStatus::Error => "error",
        }
    }
}

/// One provider's opinion on a single artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusVote {
    pub provider: String,
    /// Probability in `[0, 1]`; `None` when the probe did not produce one.
    pub probability: Option<f64>,
    pub weight: f64,
    pub status: ProbeStatus,
    pub rationale: String,
    /// Upstream correlation id (e.g. the provider's `x-request-id` header).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evidence_ref: Option<String>,
}

impl ConsensusVote {
    pub fn new(
        provider: impl Into<String>,
        probability: Option<f64>,
        weight: f64,
        status: ProbeStatus,
        rationale: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            probability: probability.map(clip),
            weight: weight.max(0.0),
            status,
            rationale: rationale.into(),
            evidence_ref: None,
        }
    }

    pub fn with_evidence(mut self, evidence_ref: Option<String>) -> Self {
        self.evidence_ref = evidence_ref;
        self
    }

    fn counts(&self) -> bool {
        self.status == ProbeStatus::Ok && self.weight > 0.0 && self.probability.is_some()
    }
}

/// Aggregated consensus over all provider votes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusSummary {
    pub final_probability: f64,
    pub threshold: f64,
    pub is_ai_generated: bool,
    /// Weighted standard deviation of the `ok` probabilities.
    pub disagreement: f64,
    pub providers: Vec<ConsensusVote>,
}

/// Clamp a probability into `[0, 1]`.
pub fn clip(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Combine provider votes into a final probability and verdict.
///
/// Returns `None` when no vote is usable (`ok` with positive weight); the
/// engine treats that as a hard fault because the internal detector always
/// contributes an `ok` vote on the success path.
pub fn summarize(votes: Vec<ConsensusVote>, threshold: f64) -> Option<ConsensusSummary> {
    let threshold = clip(threshold);
    let active: Vec<(f64, f64)> = votes
        .iter()
        .filter(|v| v.counts())
        .map(|v| (v.probability.unwrap_or(0.0), v.weight))
        .collect();

    if active.is_empty() {
        return None;
    }

    // A single usable vote passes through bit-identically.
    let (final_probability, disagreement) = if active.len() == 1 {
        (active[0].0, 0.0)
    } else {
        let weight_sum: f64 = active.iter().map(|(_, w)| w).sum();
        let mean = active.iter().map(|(p, w)| p * w).sum::<f64>() / weight_sum;
        let variance = active
            .iter()
            .map(|(p, w)| w * (p - mean) * (p - mean))
            .sum::<f64>()
            / weight_sum;
        (clip(mean), variance.sqrt())
    };

    Some(ConsensusSummary {
        final_probability,
        threshold,
        is_ai_generated: final_probability >= threshold,
        disagreement,
        providers: votes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_vote(provider: &str, p: f64, w: f64) -> ConsensusVote {
        ConsensusVote::new(provider, Some(p), w, ProbeStatus::Ok, "test")
    }

    #[test]
    fn single_ok_vote_passes_through_exactly() {
        let p = 0.723_456_789_012_345;
        let summary = summarize(vec![ok_vote("internal", p, 0.6)], 0.5).unwrap();
        assert_eq!(summary.final_probability, p);
        assert_eq!(summary.disagreement, 0.0);
        assert!(summary.is_ai_generated);
    }

    #[test]
    fn weighted_mean_over_ok_votes() {
        let votes = vec![ok_vote("internal", 0.8, 0.6), ok_vote("copyleaks", 0.2, 0.4)];
        let summary = summarize(votes, 0.5).unwrap();
        let expected = (0.8 * 0.6 + 0.2 * 0.4) / 1.0;
        assert!((summary.final_probability - expected).abs() < 1e-9);
    }

    #[test]
    fn failed_votes_are_excluded_from_the_mean() {
        let votes = vec![
            ok_vote("internal", 0.9, 0.6),
            ConsensusVote::new(
                "copyleaks",
                None,
                0.4,
                ProbeStatus::Unavailable,
                "probe timed out after 2s",
            ),
        ];
        let summary = summarize(votes, 0.5).unwrap();
        assert_eq!(summary.final_probability, 0.9);
        assert_eq!(summary.providers.len(), 2);
    }

    #[test]
    fn zero_weight_ok_votes_do_not_count() {
        let votes = vec![ok_vote("internal", 0.4, 0.6), ok_vote("hive", 1.0, 0.0)];
        let summary = summarize(votes, 0.5).unwrap();
        assert_eq!(summary.final_probability, 0.4);
        assert!(!summary.is_ai_generated);
    }

    #[test]
    fn disagreement_is_weighted_stddev() {
        let votes = vec![ok_vote("a", 0.2, 1.0), ok_vote("b", 0.8, 1.0)];
        let summary = summarize(votes, 0.5).unwrap();
        // mean 0.5, each deviation 0.3 -> stddev 0.3
        assert!((summary.disagreement - 0.3).abs() < 1e-9);
    }

    #[test]
    fn verdict_agrees_with_threshold() {
        let summary = summarize(vec![ok_vote("internal", 0.5, 1.0)], 0.5).unwrap();
        assert!(summary.is_ai_generated);
        let summary = summarize(vec![ok_vote("internal", 0.499, 1.0)], 0.5).unwrap();
        assert!(!summary.is_ai_generated);
    }

    #[test]
    fn no_usable_votes_yields_none() {
        let votes = vec![ConsensusVote::new(
            "internal",
            None,
            0.6,
            ProbeStatus::Error,
            "decode failure",
        )];
        assert!(summarize(votes, 0.5).is_none());
    }
}
