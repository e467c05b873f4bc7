//! Image signal analysis over raw bytes: entropy profile, container
//! markers, and metadata forensics.
//!
//! Works without decoding pixels. Generated images tend to ship without
//! camera metadata and often carry generator tags in ancillary chunks.

use serde_json::json;

use super::{byte_entropy, clip01, confidence_label, contains_keyword, DetectionOutcome};

/// How much of the head of the file is scanned for metadata markers.
const METADATA_SCAN_BYTES: usize = 64 * 1024;

/// Generator tags seen in PNG text chunks and JPEG comments.
const GENERATOR_KEYWORDS: [&[u8]; 7] = [
    b"midjourney",
    b"stable diffusion",
    b"stable-diffusion",
    b"dall-e",
    b"sdxl",
    b"comfyui",
    b"novelai",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Png,
    Jpeg,
    Webp,
    Unknown,
}

impl Container {
    fn as_str(self) -> &'static str {
        match self {
            Container::Png => "png",
            Container::Jpeg => "jpeg",
            Container::Webp => "webp",
            Container::Unknown => "unknown",
        }
    }
}

/// Analyze an image payload and score its AI likelihood.
pub fn detect(data: &[u8], filename: &str) -> DetectionOutcome {
    let container = sniff_container(data);
    let head = &data[..data.len().min(METADATA_SCAN_BYTES)];

    let entropy = byte_entropy(data);
    let has_camera_metadata = has_exif(head, container);
    let generator_tag = GENERATOR_KEYWORDS
        .iter()
        .any(|kw| contains_keyword(head, kw));

    let mut flags: Vec<&str> = Vec::new();
    if container == Container::Unknown {
        flags.push("unknown_container_signature");
    }
    if generator_tag {
        flags.push("generator_metadata_tag");
    }
    if !has_camera_metadata {
        flags.push("no_camera_metadata");
    }

    let entropy_signal = clip01((entropy - 6.5) / 1.5);
    let metadata_signal = clip01(
        0.45 + if generator_tag { 0.45 } else { 0.0 }
            - if has_camera_metadata { 0.30 } else { 0.0 },
    );
    let probability = (entropy_signal * 0.40 + metadata_signal * 0.60).clamp(0.10, 0.95);
    let is_ai = probability > 0.5;

    DetectionOutcome {
        probability,
        model_prediction: is_ai.then(|| "unknown".to_string()),
        signals: json!({
            "container": container.as_str(),
            "entropy_score": entropy,
            "has_camera_metadata": has_camera_metadata,
            "generator_tag": generator_tag,
            "flags": flags,
            "filename": filename,
        }),
        explanation: explain(is_ai, probability, generator_tag, has_camera_metadata),
    }
}

fn sniff_container(data: &[u8]) -> Container {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        Container::Png
    } else if data.starts_with(b"\xFF\xD8\xFF") {
        Container::Jpeg
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Container::Webp
    } else {
        Container::Unknown
    }
}

/// Camera metadata check: EXIF marker for JPEG/WebP, eXIf chunk for PNG.
fn has_exif(head: &[u8], container: Container) -> bool {
    match container {
        Container::Jpeg | Container::Webp => contains_keyword(head, b"Exif"),
        Container::Png => head.windows(4).any(|w| w == b"eXIf"),
        Container::Unknown => false,
    }
}

fn explain(is_ai: bool, probability: f64, generator_tag: bool, has_camera_metadata: bool) -> String {
    let verdict = if is_ai {
        "likely AI-generated"
    } else {
        "likely authentic"
    };
    let mut reasons: Vec<&str> = Vec::new();
    if generator_tag {
        reasons.push("generator tag in embedded metadata");
    }
    if !has_camera_metadata {
        reasons.push("no camera metadata present");
    } else {
        reasons.push("camera metadata present");
    }
    format!(
        "Image appears {verdict} ({} confidence). Key indicators: {}.",
        confidence_label(probability),
        reasons.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_with_chunk(chunk: &[u8]) -> Vec<u8> {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.extend_from_slice(chunk);
        data.extend_from_slice(&[0x40u8; 512]);
        data
    }

    #[test]
    fn generator_tag_pushes_probability_up() {
        let tagged = detect(&png_with_chunk(b"tEXtSoftware\0Stable Diffusion"), "a.png");
        let plain = detect(&png_with_chunk(b"tEXtSoftware\0Lightroom"), "b.png");
        assert!(tagged.probability > plain.probability);
        assert!(tagged.signals["generator_tag"].as_bool().unwrap());
    }

    #[test]
    fn exif_marker_lowers_probability() {
        let mut jpeg = b"\xFF\xD8\xFF\xE1".to_vec();
        jpeg.extend_from_slice(b"\x00\x10Exif\x00\x00");
        jpeg.extend_from_slice(&[0x11u8; 256]);
        let with_exif = detect(&jpeg, "photo.jpg");

        let bare = detect(b"\xFF\xD8\xFF\xDB plain jpeg body", "bare.jpg");
        assert!(with_exif.probability < bare.probability);
    }

    #[test]
    fn unknown_container_is_flagged() {
        let outcome = detect(b"not an image at all", "file.bin");
        assert_eq!(outcome.signals["container"], "unknown");
        assert!(outcome.signals["flags"]
            .as_array()
            .unwrap()
            .iter()
            .any(|f| f == "unknown_container_signature"));
    }

    #[test]
    fn probability_stays_in_clamped_range() {
        for data in [&b""[..], &[0u8; 16], b"\x89PNG\r\n\x1a\nrest"] {
            let p = detect(data, "x").probability;
            assert!((0.10..=0.95).contains(&p));
        }
    }
}
