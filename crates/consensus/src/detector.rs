//! Internal detector dispatch.
//!
//! Routes an artifact to the matching signal analysis in `provtrack-core`.
//! Both the HTTP handlers and the scheduler call this directly, then feed
//! the outcome into [`ConsensusEngine::score`](crate::ConsensusEngine::score)
//! as the internal vote.

use provtrack_core::error::CoreError;
use provtrack_core::signals::{self, DetectionOutcome};
use provtrack_core::types::ContentType;

use crate::provider::ProbeRequest;

/// Run the internal detector for the given artifact.
///
/// Fails with a validation error for undecodable payloads (bad WAV data)
/// and with `DetectorUnavailable` when the artifact view does not match the
/// modality, which indicates a wiring bug rather than bad client input.
pub fn detect_internal(request: &ProbeRequest<'_>) -> Result<DetectionOutcome, CoreError> {
    let missing = || {
        CoreError::DetectorUnavailable(format!(
            "no {} payload supplied to the internal detector",
            request.content_type
        ))
    };

    match request.content_type {
        ContentType::Text => {
            let text = request.text.ok_or_else(missing)?;
            Ok(signals::text::detect(text))
        }
        ContentType::Image => {
            let data = request.binary.ok_or_else(missing)?;
            Ok(signals::image::detect(data, request.filename.unwrap_or("unknown")))
        }
        ContentType::Audio => {
            let data = request.binary.ok_or_else(missing)?;
            signals::audio::detect(data, request.filename.unwrap_or("unknown.wav"))
        }
        ContentType::Video => {
            let data = request.binary.ok_or_else(missing)?;
            Ok(signals::video::detect(data, request.filename.unwrap_or("unknown.mp4")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_text_to_the_text_detector() {
        let request = ProbeRequest::text("A plain sentence for the detector to chew on.");
        let outcome = detect_internal(&request).unwrap();
        assert!((0.0..=1.0).contains(&outcome.probability));
        assert!(outcome.signals.get("burstiness").is_some());
    }

    #[test]
    fn mismatched_artifact_is_a_detector_fault() {
        let request = ProbeRequest {
            content_type: ContentType::Image,
            text: Some("not binary"),
            binary: None,
            filename: None,
        };
        let err = detect_internal(&request).unwrap_err();
        assert_eq!(err.name(), "DetectorUnavailable");
    }

    #[test]
    fn bad_audio_is_a_validation_error() {
        let request = ProbeRequest::binary(ContentType::Audio, b"not a wav", "x.wav");
        let err = detect_internal(&request).unwrap_err();
        assert_eq!(err.name(), "ValidationFailed");
    }
}
