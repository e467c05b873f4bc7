//! Modality-specific signal heuristics for the internal detector.
//!
//! Each submodule turns raw input into a [`DetectionOutcome`]: a probability,
//! an optional model attribution, a per-signal breakdown, and a one-sentence
//! explanation. The analyses are deterministic byte/sample statistics; no
//! network access and no model weights.

pub mod audio;
pub mod image;
pub mod text;
pub mod video;

use serde_json::Value;

/// Result of one internal detector pass.
#[derive(Debug, Clone)]
pub struct DetectionOutcome {
    /// AI-likelihood in `[0, 1]`.
    pub probability: f64,
    /// Attributed generator when the verdict leans AI, otherwise `None`.
    pub model_prediction: Option<String>,
    /// Per-signal breakdown embedded into the stored result payload.
    pub signals: Value,
    /// Human-readable summary of the strongest indicators.
    pub explanation: String,
}

/// Clamp into `[0, 1]`.
pub(crate) fn clip01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Shannon entropy of a byte slice in bits per byte (`[0, 8]`).
pub(crate) fn byte_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    let total = data.len() as f64;
    let entropy: f64 = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum();
    entropy.clamp(0.0, 8.0)
}

/// Case-insensitive subsequence search over raw bytes.
pub(crate) fn contains_keyword(haystack: &[u8], keyword: &[u8]) -> bool {
    if keyword.is_empty() || haystack.len() < keyword.len() {
        return false;
    }
    haystack
        .windows(keyword.len())
        .any(|w| w.eq_ignore_ascii_case(keyword))
}

/// Confidence wording shared by all explanation builders.
pub(crate) fn confidence_label(probability: f64) -> &'static str {
    if probability > 0.75 {
        "high"
    } else if probability > 0.5 {
        "moderate"
    } else {
        "low"
    }
}
