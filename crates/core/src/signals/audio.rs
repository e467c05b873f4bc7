//! Audio signal analysis for PCM WAV payloads: spectral flatness, dynamic
//! range, clipping, and zero-crossing rate.

use serde_json::json;

use crate::error::CoreError;

use super::{clip01, confidence_label, DetectionOutcome};

/// Samples used for the spectral estimate.
const SPECTRUM_WINDOW: usize = 2048;

/// Spectrum bins evaluated (DC excluded).
const SPECTRUM_BINS: usize = 64;

/// Analyze a WAV payload and score its AI likelihood.
///
/// Fails with a validation error when the payload is not decodable PCM WAV.
pub fn detect(data: &[u8], filename: &str) -> Result<DetectionOutcome, CoreError> {
    let decoded = decode_wav(data)?;

    let spectral_flatness = spectral_flatness(&decoded.samples);
    let dynamic_range = dynamic_range(&decoded.samples);
    let clipping_ratio = clipping_ratio(&decoded.samples);
    let zero_crossing_rate = zero_crossing_rate(&decoded.samples);

    let flatness_signal = clip01((spectral_flatness - 0.25) / 0.45);
    let dynamic_signal = clip01((0.22 - dynamic_range) / 0.22);
    let clipping_signal = clip01(clipping_ratio / 0.05);
    let zcr_signal = if !(0.02..=0.35).contains(&zero_crossing_rate) {
        1.0
    } else {
        0.2
    };

    let probability = (flatness_signal * 0.35
        + dynamic_signal * 0.30
        + clipping_signal * 0.20
        + zcr_signal * 0.15)
        .clamp(0.05, 0.95);
    let is_ai = probability > 0.5;

    Ok(DetectionOutcome {
        probability,
        model_prediction: is_ai.then(|| "unknown".to_string()),
        signals: json!({
            "sample_rate": decoded.sample_rate,
            "channel_count": decoded.channels,
            "duration_seconds": decoded.samples.len() as f64 / decoded.sample_rate as f64,
            "spectral_flatness": spectral_flatness,
            "dynamic_range": dynamic_range,
            "clipping_ratio": clipping_ratio,
            "zero_crossing_rate": zero_crossing_rate,
            "filename": filename,
        }),
        explanation: explain(is_ai, probability, spectral_flatness, dynamic_range, clipping_ratio),
    })
}

struct DecodedWav {
    samples: Vec<f64>,
    sample_rate: u32,
    channels: u16,
}

/// Minimal RIFF/WAVE reader for 8/16/32-bit integer PCM.
fn decode_wav(data: &[u8]) -> Result<DecodedWav, CoreError> {
    let invalid = |msg: &str| CoreError::validation(format!("invalid WAV audio: {msg}"));

    if data.len() < 12 || &data[..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(invalid("missing RIFF/WAVE header"));
    }

    let mut offset = 12usize;
    let mut format: Option<(u16, u16, u32, u16)> = None;
    let mut pcm: Option<&[u8]> = None;

    while offset + 8 <= data.len() {
        let chunk_id = &data[offset..offset + 4];
        let chunk_len = u32::from_le_bytes(data[offset + 4..offset + 8].try_into().unwrap()) as usize;
        let body_start = offset + 8;
        let body_end = body_start.checked_add(chunk_len).ok_or_else(|| invalid("chunk overflow"))?;
        if body_end > data.len() {
            return Err(invalid("truncated chunk"));
        }
        let body = &data[body_start..body_end];

        match chunk_id {
            b"fmt " => {
                if body.len() < 16 {
                    return Err(invalid("short fmt chunk"));
                }
                format = Some((
                    u16::from_le_bytes(body[0..2].try_into().unwrap()),
                    u16::from_le_bytes(body[2..4].try_into().unwrap()),
                    u32::from_le_bytes(body[4..8].try_into().unwrap()),
                    u16::from_le_bytes(body[14..16].try_into().unwrap()),
                ));
            }
            b"data" => pcm = Some(body),
            _ => {}
        }

        // Chunks are word-aligned.
        offset = body_end + (chunk_len % 2);
    }

    let (audio_format, channels, sample_rate, bits) =
        format.ok_or_else(|| invalid("missing fmt chunk"))?;
    let pcm = pcm.ok_or_else(|| invalid("missing data chunk"))?;

    if audio_format != 1 {
        return Err(invalid("only PCM encoding is supported"));
    }
    if channels == 0 || sample_rate == 0 {
        return Err(invalid("zero channels or sample rate"));
    }

    let interleaved: Vec<f64> = match bits {
        8 => pcm.iter().map(|&b| (f64::from(b) - 128.0) / 128.0).collect(),
        16 => pcm
            .chunks_exact(2)
            .map(|c| f64::from(i16::from_le_bytes([c[0], c[1]])) / 32768.0)
            .collect(),
        32 => pcm
            .chunks_exact(4)
            .map(|c| f64::from(i32::from_le_bytes([c[0], c[1], c[2], c[3]])) / 2147483648.0)
            .collect(),
        other => return Err(invalid(&format!("unsupported bit depth {other}"))),
    };

    if interleaved.is_empty() {
        return Err(invalid("audio contains no samples"));
    }

    // Mix down to mono.
    let channels_usize = channels as usize;
    let frames = interleaved.len() / channels_usize;
    let samples: Vec<f64> = (0..frames)
        .map(|f| {
            interleaved[f * channels_usize..(f + 1) * channels_usize]
                .iter()
                .sum::<f64>()
                / channels as f64
        })
        .collect();

    Ok(DecodedWav {
        samples,
        sample_rate,
        channels,
    })
}

/// Geometric-to-arithmetic mean ratio over a coarse magnitude spectrum.
fn spectral_flatness(samples: &[f64]) -> f64 {
    if samples.len() < 32 {
        return 0.5;
    }
    let n = samples.len().min(SPECTRUM_WINDOW);
    let window = &samples[..n];

    let mut log_sum = 0.0f64;
    let mut lin_sum = 0.0f64;
    for k in 1..=SPECTRUM_BINS {
        let mut re = 0.0f64;
        let mut im = 0.0f64;
        for (i, &x) in window.iter().enumerate() {
            // Hann-weighted DFT at bin k.
            let hann = 0.5
                - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos();
            let angle = 2.0 * std::f64::consts::PI * k as f64 * i as f64 / n as f64;
            re += x * hann * angle.cos();
            im -= x * hann * angle.sin();
        }
        let magnitude = (re * re + im * im).sqrt() + 1e-12;
        log_sum += magnitude.ln();
        lin_sum += magnitude;
    }

    let geometric = (log_sum / SPECTRUM_BINS as f64).exp();
    let arithmetic = lin_sum / SPECTRUM_BINS as f64;
    if arithmetic == 0.0 {
        return 0.5;
    }
    clip01(geometric / arithmetic)
}

/// Robust dynamic range: P95 - P5 of absolute amplitude.
fn dynamic_range(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut magnitudes: Vec<f64> = samples.iter().map(|s| s.abs()).collect();
    magnitudes.sort_by(|a, b| a.total_cmp(b));
    let p = |q: f64| magnitudes[((magnitudes.len() - 1) as f64 * q) as usize];
    clip01(p(0.95) - p(0.05))
}

fn clipping_ratio(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let clipped = samples.iter().filter(|s| s.abs() >= 0.98).count();
    clipped as f64 / samples.len() as f64
}

fn zero_crossing_rate(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / (samples.len() - 1) as f64
}

fn explain(
    is_ai: bool,
    probability: f64,
    spectral_flatness: f64,
    dynamic_range: f64,
    clipping_ratio: f64,
) -> String {
    let verdict = if is_ai {
        "likely AI-generated"
    } else {
        "likely human-recorded"
    };
    let mut reasons: Vec<&str> = Vec::new();
    if spectral_flatness > 0.55 {
        reasons.push("high spectral flatness");
    }
    if dynamic_range < 0.12 {
        reasons.push("compressed dynamic range");
    }
    if clipping_ratio > 0.02 {
        reasons.push("frequent near-clipping samples");
    }
    if reasons.is_empty() {
        reasons.push("mixed acoustic signals");
    }
    format!(
        "Audio appears {verdict} ({} confidence). Key indicators: {}.",
        confidence_label(probability),
        reasons.join(", ")
    )
}
