//! Video signal analysis: byte-entropy profile, distribution uniformity,
//! repeated-chunk patterns, and container signature flags.

use std::collections::HashMap;

use serde_json::json;

use super::{byte_entropy, clip01, confidence_label, contains_keyword, DetectionOutcome};

/// Sampled head+tail bytes for the statistical passes.
const SAMPLE_BYTES: usize = 2 * 1024 * 1024;

/// Fixed chunk size for the repetition pass.
const CHUNK_SIZE: usize = 32;

/// Header window scanned for signature flags.
const HEADER_BYTES: usize = 4096;

const ENCODER_KEYWORDS: [&[u8]; 6] = [b"lavf", b"ffmpeg", b"x264", b"x265", b"nvenc", b"svt"];
const AI_KEYWORDS: [&[u8]; 6] = [b"synthesia", b"deepfake", b"diffusion", b"runway", b"sora", b"genvid"];

/// Analyze a video payload and score its AI likelihood.
pub fn detect(data: &[u8], filename: &str) -> DetectionOutcome {
    let sampled = sample(data);

    let entropy_score = byte_entropy(sampled);
    let byte_uniformity = byte_uniformity(sampled);
    let repeated_chunk_ratio = repeated_chunk_ratio(sampled);
    let signature_flags = signature_flags(data, filename);

    let entropy_signal = clip01(entropy_score - 6.8);
    let uniformity_signal = clip01((byte_uniformity - 0.55) / 0.45);
    let repeat_signal = clip01(repeated_chunk_ratio / 0.20);
    let flag_signal = (signature_flags.len() as f64 * 0.25).min(1.0);

    let probability = (entropy_signal * 0.30
        + uniformity_signal * 0.25
        + repeat_signal * 0.25
        + flag_signal * 0.20)
        .clamp(0.05, 0.95);
    let is_ai = probability > 0.5;

    DetectionOutcome {
        probability,
        model_prediction: is_ai.then(|| "unknown".to_string()),
        signals: json!({
            "file_size_bytes": data.len(),
            "entropy_score": entropy_score,
            "byte_uniformity": byte_uniformity,
            "repeated_chunk_ratio": repeated_chunk_ratio,
            "signature_flags": signature_flags,
            "filename": filename,
        }),
        explanation: explain(
            is_ai,
            probability,
            entropy_score,
            repeated_chunk_ratio,
            &signature_flags,
        ),
    }
}

/// Leading sample of the payload, up to [`SAMPLE_BYTES`].
///
/// Container metadata and codec framing concentrate at the head; sampling
/// keeps the statistical passes bounded on large files.
fn sample(data: &[u8]) -> &[u8] {
    &data[..data.len().min(SAMPLE_BYTES)]
}

/// How flat the byte histogram is, in `[0, 1]`.
fn byte_uniformity(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    let mean = data.len() as f64 / 256.0;
    let variance = hist
        .iter()
        .map(|&c| {
            let d = c as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / 256.0;
    let std = variance.sqrt();
    clip01(1.0 - (std / (mean * 4.0)).min(1.0))
}

/// Fraction of fixed-size chunks that occur more than once.
fn repeated_chunk_ratio(data: &[u8]) -> f64 {
    if data.len() < CHUNK_SIZE * 2 {
        return 0.0;
    }
    let mut counts: HashMap<&[u8], u32> = HashMap::new();
    let usable = data.len() - (data.len() % CHUNK_SIZE);
    for chunk in data[..usable].chunks_exact(CHUNK_SIZE) {
        *counts.entry(chunk).or_insert(0) += 1;
    }
    let total: u64 = counts.values().map(|&c| u64::from(c)).sum();
    let repeated: u64 = counts
        .values()
        .filter(|&&c| c > 1)
        .map(|&c| u64::from(c))
        .sum();
    clip01(repeated as f64 / total as f64)
}

/// Suspicious or notable container/signature observations.
fn signature_flags(data: &[u8], filename: &str) -> Vec<&'static str> {
    let mut flags = Vec::new();
    let header = &data[..data.len().min(HEADER_BYTES)];
    let lower_name = filename.to_lowercase();

    let has_mp4 = contains_keyword(header, b"ftyp");
    let has_ebml = header.windows(4).any(|w| w == b"\x1a\x45\xdf\xa3");
    let known_extension = [".avi", ".mov", ".mkv"]
        .iter()
        .any(|ext| lower_name.ends_with(ext));
    if !has_mp4 && !has_ebml && !known_extension {
        flags.push("unknown_container_signature");
    }

    if ENCODER_KEYWORDS.iter().any(|kw| contains_keyword(header, kw)) {
        flags.push("generated_encoder_tag");
    }
    if AI_KEYWORDS.iter().any(|kw| contains_keyword(header, kw)) {
        flags.push("ai_keyword_tag");
    }
    if data.len() < 20 * 1024 {
        flags.push("unusually_small_file");
    }

    flags
}

fn explain(
    is_ai: bool,
    probability: f64,
    entropy_score: f64,
    repeated_chunk_ratio: f64,
    signature_flags: &[&str],
) -> String {
    let verdict = if is_ai {
        "likely AI-generated"
    } else {
        "likely human-captured"
    };
    let mut reasons: Vec<&str> = Vec::new();
    if entropy_score > 7.5 {
        reasons.push("high entropy profile");
    }
    if repeated_chunk_ratio > 0.08 {
        reasons.push("repeated chunk patterns");
    }
    if signature_flags.contains(&"ai_keyword_tag") {
        reasons.push("AI-related metadata keywords");
    }
    if reasons.is_empty() {
        reasons.push("mixed container and byte-pattern signals");
    }
    format!(
        "Video appears {verdict} ({} confidence). Key indicators: {}.",
        confidence_label(probability),
        reasons.join(", ")
    )
}
