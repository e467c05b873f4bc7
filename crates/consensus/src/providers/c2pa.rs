//! C2PA adapter: offline manifest verification via the `c2patool` CLI.
//!
//! Unlike the network adapters this one inspects the artifact locally. A
//! verified manifest is strong evidence of a signed provenance chain and
//! pulls the probability down; a present-but-unverifiable manifest nudges
//! it up slightly.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use provtrack_core::types::ContentType;
use serde_json::Value;

use crate::provider::{ProbeOutcome, ProbeRequest, Provider};

/// Probability assigned when the manifest chain verifies.
const VERIFIED_PROBABILITY: f64 = 0.15;

/// Probability when a manifest exists but does not verify.
const UNVERIFIED_MANIFEST_PROBABILITY: f64 = 0.52;

/// Probability when no manifest is present at all.
const NO_MANIFEST_PROBABILITY: f64 = 0.58;

pub struct C2paProvider {
    enabled: bool,
    tool_path: String,
    weight: f64,
    verify_timeout: Duration,
}

impl C2paProvider {
    pub fn new(enabled: bool, tool_path: String, weight: f64, verify_timeout: Duration) -> Self {
        Self {
            enabled,
            tool_path,
            weight,
            verify_timeout,
        }
    }

    async fn run_tool(&self, media_path: &std::path::Path) -> Result<Value, String> {
        // Flag order differs across c2patool releases; try the known forms.
        let attempts: [&[&str]; 3] = [
            &["--detailed", "--json"],
            &["--json"],
            &[],
        ];
        let mut last_error = String::new();

        for flags in attempts {
            let mut command = tokio::process::Command::new(&self.tool_path);
            command.arg(media_path).args(flags.iter().copied());
            command.kill_on_drop(true);

            let output = match tokio::time::timeout(self.verify_timeout, command.output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(err)) if err.kind() == std::io::ErrorKind::NotFound => {
                    return Err(format!("{} is not installed on this runtime", self.tool_path));
                }
                Ok(Err(err)) => {
                    last_error = format!("CLI execution error: {err}");
                    continue;
                }
                Err(_) => {
                    last_error = format!(
                        "verification timed out after {}s",
                        self.verify_timeout.as_secs()
                    );
                    continue;
                }
            };

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                last_error = format!(
                    "c2patool exited with {}: {}",
                    output.status,
                    stderr.trim().chars().take(200).collect::<String>()
                );
                continue;
            }

            match parse_json_output(&String::from_utf8_lossy(&output.stdout)) {
                Some(payload) => return Ok(payload),
                None => {
                    last_error = "c2patool returned non-JSON output".to_string();
                    continue;
                }
            }
        }

        Err(last_error)
    }
}

/// Parse tool stdout, tolerating log lines around the JSON document.
fn parse_json_output(stdout: &str) -> Option<Value> {
    let cleaned = stdout.trim();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return value.is_object().then_some(value);
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    let value = serde_json::from_str::<Value>(&cleaned[start..=end]).ok()?;
    value.is_object().then_some(value)
}

/// Interpretation of a parsed c2patool payload.
struct Verification {
    manifest_present: bool,
    signature_valid: bool,
    issuer: Option<String>,
}

fn interpret_payload(payload: &Value) -> Verification {
    let manifest_present = payload.get("active_manifest").is_some()
        || payload.get("manifests").is_some()
        || payload.get("claim_generator").is_some()
        || payload
            .get("manifest_store")
            .and_then(|s| s.get("active_manifest"))
            .is_some();

    // An empty or absent validation_status list means no failures were
    // reported for the active manifest.
    let signature_valid = manifest_present
        && payload
            .get("validation_status")
            .and_then(Value::as_array)
            .map(Vec::is_empty)
            .unwrap_or(true);

    let issuer = [
        "active_manifest.claim_generator",
        "claim_generator",
        "active_manifest.issuer",
    ]
    .iter()
    .find_map(|path| {
        super::path_value(payload, path)
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    Verification {
        manifest_present,
        signature_valid,
        issuer,
    }
}

#[async_trait]
impl Provider for C2paProvider {
    fn name(&self) -> &'static str {
        "c2pa"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    async fn probe(&self, request: &ProbeRequest<'_>) -> ProbeOutcome {
        if !self.enabled {
            return ProbeOutcome::Unavailable(
                "C2PA verifier disabled in configuration".to_string(),
            );
        }
        if !matches!(request.content_type, ContentType::Image | ContentType::Video) {
            return ProbeOutcome::Unsupported(
                "C2PA applies to signed image/video assets, not text/audio payloads".to_string(),
            );
        }
        let Some(data) = request.binary.filter(|d| !d.is_empty()) else {
            return ProbeOutcome::Unsupported(
                "no media payload provided for C2PA verification".to_string(),
            );
        };

        let suffix = request
            .filename
            .and_then(|f| f.rsplit_once('.').map(|(_, ext)| ext.to_string()))
            .unwrap_or_else(|| "bin".to_string());
        let media_path: PathBuf = std::env::temp_dir().join(format!(
            "c2pa-{}.{suffix}",
            uuid::Uuid::new_v4()
        ));

        if let Err(err) = tokio::fs::write(&media_path, data).await {
            return ProbeOutcome::Error {
                rationale: format!("failed to stage media for verification: {err}"),
                evidence_ref: None,
            };
        }

        let result = self.run_tool(&media_path).await;
        let _ = tokio::fs::remove_file(&media_path).await;

        let payload = match result {
            Ok(payload) => payload,
            Err(rationale) if rationale.contains("not installed") => {
                return ProbeOutcome::Unavailable(rationale)
            }
            Err(rationale) => {
                return ProbeOutcome::Error {
                    rationale,
                    evidence_ref: None,
                }
            }
        };

        let verification = interpret_payload(&payload);
        let issuer_text = verification
            .issuer
            .as_deref()
            .map(|issuer| format!("; issuer={issuer}"))
            .unwrap_or_default();

        if verification.manifest_present && verification.signature_valid {
            ProbeOutcome::Ok {
                probability: VERIFIED_PROBABILITY,
                rationale: format!("C2PA manifest verified{issuer_text}"),
                evidence_ref: verification.issuer,
            }
        } else if verification.manifest_present {
            ProbeOutcome::Ok {
                probability: UNVERIFIED_MANIFEST_PROBABILITY,
                rationale: format!("C2PA manifest present but not verifiable{issuer_text}"),
                evidence_ref: verification.issuer,
            }
        } else {
            ProbeOutcome::Ok {
                probability: NO_MANIFEST_PROBABILITY,
                rationale: "no C2PA manifest found".to_string(),
                evidence_ref: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn disabled_provider_is_unavailable() {
        let provider = C2paProvider::new(false, "c2patool".into(), 0.3, Duration::from_secs(5));
        let request = ProbeRequest::binary(ContentType::Image, b"png bytes", "a.png");
        assert!(matches!(
            provider.probe(&request).await,
            ProbeOutcome::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn text_is_unsupported() {
        let provider = C2paProvider::new(true, "c2patool".into(), 0.3, Duration::from_secs(5));
        let request = ProbeRequest::text("sample");
        assert!(matches!(
            provider.probe(&request).await,
            ProbeOutcome::Unsupported(_)
        ));
    }

    #[test]
    fn payload_with_clean_validation_is_verified() {
        let payload = json!({
            "active_manifest": {"claim_generator": "Adobe Photoshop"},
            "validation_status": []
        });
        let v = interpret_payload(&payload);
        assert!(v.manifest_present);
        assert!(v.signature_valid);
        assert_eq!(v.issuer.as_deref(), Some("Adobe Photoshop"));
    }

    #[test]
    fn validation_failures_mark_the_manifest_unverified() {
        let payload = json!({
            "active_manifest": {},
            "validation_status": [{"code": "signingCredential.untrusted"}]
        });
        let v = interpret_payload(&payload);
        assert!(v.manifest_present);
        assert!(!v.signature_valid);
    }

    #[test]
    fn json_is_recovered_from_noisy_stdout() {
        let payload = parse_json_output("reading manifest...\n{\"manifests\": {}}\n").unwrap();
        assert!(payload.get("manifests").is_some());
        assert!(parse_json_output("no json here").is_none());
        assert!(parse_json_output("").is_none());
    }
}
