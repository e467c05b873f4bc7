//! Detection endpoints: one per modality plus URL-based detection.

use std::time::Instant;

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::Json;
use provtrack_consensus::{detect_internal, ProbeRequest};
use provtrack_core::consensus::ConsensusSummary;
use provtrack_core::error::{CoreError, FieldError};
use provtrack_core::hashing::{content_hash_text, sha256_hex};
use provtrack_core::types::{ContentType, Source};
use provtrack_db::models::analysis::CreateAnalysis;
use provtrack_db::repositories::AnalysisRepo;
use serde::{Deserialize, Serialize};
use serde_json::json;

use provtrack_events::AuditEvent;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DetectTextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct DetectUrlRequest {
    pub url: String,
}

/// Response shape shared by all detection endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct DetectionResponse {
    pub analysis_id: String,
    pub is_ai_generated: bool,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_prediction: Option<String>,
    /// Modality-specific signal breakdown.
    pub analysis: serde_json::Value,
    pub explanation: String,
    pub processing_time_ms: f64,
    pub consensus: ConsensusSummary,
}

// ---------------------------------------------------------------------------
// Shared detection flow
// ---------------------------------------------------------------------------

/// Input for one detection pass, borrowed from the request body.
pub(crate) struct DetectionInput<'a> {
    pub content_type: ContentType,
    pub text: Option<&'a str>,
    pub binary: Option<&'a [u8]>,
    pub filename: Option<&'a str>,
    pub source: Source,
    pub source_url: Option<String>,
}

/// The full request path: internal detection, consensus fan-out, durable
/// store, audit event, webhook enqueue.
pub(crate) async fn run_detection(
    state: &AppState,
    input: DetectionInput<'_>,
    request_id: Option<String>,
) -> AppResult<DetectionResponse> {
    let started = Instant::now();

    let probe = ProbeRequest {
        content_type: input.content_type,
        text: input.text,
        binary: input.binary,
        filename: input.filename,
    };
    let internal = detect_internal(&probe)?;
    let summary = state.engine.score(&internal, &probe).await?;

    let mut model_prediction = internal.model_prediction.clone();
    if summary.is_ai_generated && model_prediction.is_none() {
        model_prediction = Some("unknown".to_string());
    }

    let content_hash = match (input.text, input.binary) {
        (Some(text), _) => content_hash_text(text),
        (None, Some(binary)) => sha256_hex(binary),
        (None, None) => {
            return Err(AppError::Core(CoreError::DetectorUnavailable(
                "detection input carried no payload".to_string(),
            )))
        }
    };
    let input_size = input
        .text
        .map(|t| t.len() as i64)
        .or_else(|| input.binary.map(|b| b.len() as i64))
        .unwrap_or(0);

    let create = CreateAnalysis {
        analysis_id: uuid::Uuid::new_v4().to_string(),
        content_type: input.content_type.as_str().to_string(),
        content_hash: content_hash.clone(),
        is_ai_generated: summary.is_ai_generated,
        confidence: summary.final_probability,
        model_prediction: model_prediction.clone(),
        result_payload: json!({
            "signals": &internal.signals,
            "explanation": &internal.explanation,
            "consensus": &summary,
        }),
        source: input.source.as_str().to_string(),
        source_url: input.source_url.clone(),
        filename: input.filename.map(str::to_string),
        input_size,
    };

    // A detection result that cannot be persisted is useless for audit, so
    // the write failure fails the request.
    let outcome = AnalysisRepo::put(&state.pool, &create, state.config.dedup_window_seconds)
        .await
        .map_err(|e| AppError::Core(CoreError::Persistence(e.to_string())))?;

    state.audit.emit(
        AuditEvent::new("detection.completed")
            .with_request_id(request_id)
            .with_payload(json!({
                "analysis_id": &outcome.analysis_id,
                "content_type": input.content_type.as_str(),
                "source": input.source.as_str(),
                "is_ai_generated": summary.is_ai_generated,
                "confidence": summary.final_probability,
                "deduplicated": outcome.deduplicated,
            })),
    );

    state
        .webhooks
        .enqueue_event(
            "detection.completed",
            json!({
                "analysis_id": &outcome.analysis_id,
                "content_type": input.content_type.as_str(),
                "source": input.source.as_str(),
                "is_ai_generated": summary.is_ai_generated,
                "confidence": summary.final_probability,
            }),
        )
        .await;

    Ok(DetectionResponse {
        analysis_id: outcome.analysis_id,
        is_ai_generated: summary.is_ai_generated,
        confidence: summary.final_probability,
        model_prediction,
        analysis: internal.signals,
        explanation: internal.explanation,
        processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        consensus: summary,
    })
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// POST /detect/text
pub async fn detect_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DetectTextRequest>,
) -> AppResult<Json<DetectionResponse>> {
    let text = request.text.trim();
    validate_text(text, &state)?;

    let response = run_detection(
        &state,
        DetectionInput {
            content_type: ContentType::Text,
            text: Some(text),
            binary: None,
            filename: None,
            source: Source::Api,
            source_url: None,
        },
        request_id(&headers),
    )
    .await?;
    Ok(Json(response))
}

pub(crate) fn validate_text(text: &str, state: &AppState) -> Result<(), AppError> {
    let length = text.chars().count();
    if length < state.config.min_text_length || length > state.config.max_text_length {
        return Err(AppError::Core(CoreError::Validation {
            detail: "text length out of range".to_string(),
            fields: vec![FieldError {
                field: "text".to_string(),
                message: format!(
                    "must be between {} and {} characters, got {length}",
                    state.config.min_text_length, state.config.max_text_length
                ),
            }],
        }));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// File uploads
// ---------------------------------------------------------------------------

struct Upload {
    data: Vec<u8>,
    filename: String,
    content_type: Option<String>,
}

/// Pull the `file` part out of a multipart body.
async fn read_upload(mut multipart: Multipart, fallback_name: &str) -> Result<Upload, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Core(CoreError::validation(format!("invalid multipart body: {e}"))))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| fallback_name.to_string());
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| {
                AppError::Core(CoreError::validation(format!("failed to read upload: {e}")))
            })?
            .to_vec();
        return Ok(Upload {
            data,
            filename,
            content_type,
        });
    }
    Err(AppError::Core(CoreError::Validation {
        detail: "multipart field 'file' is required".to_string(),
        fields: vec![FieldError {
            field: "file".to_string(),
            message: "missing".to_string(),
        }],
    }))
}

fn check_upload(
    upload: &Upload,
    allowed_types: &[&str],
    allowed_extensions: &[&str],
    max_bytes: usize,
    kind: &str,
) -> Result<(), AppError> {
    let type_ok = upload
        .content_type
        .as_deref()
        .is_some_and(|ct| allowed_types.contains(&ct));
    let name = upload.filename.to_lowercase();
    let extension_ok = allowed_extensions.iter().any(|ext| name.ends_with(ext));
    if !type_ok && !extension_ok {
        return Err(AppError::Core(CoreError::validation(format!(
            "invalid {kind} file type; allowed: {}",
            allowed_types.join(", ")
        ))));
    }
    if upload.data.is_empty() {
        return Err(AppError::Core(CoreError::validation(format!(
            "uploaded {kind} is empty"
        ))));
    }
    if upload.data.len() > max_bytes {
        return Err(AppError::Core(CoreError::InputTooLarge(format!(
            "{kind} exceeds maximum size of {} MiB",
            max_bytes / (1024 * 1024)
        ))));
    }
    Ok(())
}

/// POST /detect/image
pub async fn detect_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<DetectionResponse>> {
    let upload = read_upload(multipart, "unknown").await?;
    check_upload(
        &upload,
        &["image/png", "image/jpeg", "image/jpg", "image/webp"],
        &[".png", ".jpg", ".jpeg", ".webp"],
        state.config.max_image_bytes,
        "image",
    )?;

    let response = run_detection(
        &state,
        DetectionInput {
            content_type: ContentType::Image,
            text: None,
            binary: Some(&upload.data),
            filename: Some(&upload.filename),
            source: Source::Api,
            source_url: None,
        },
        request_id(&headers),
    )
    .await?;
    Ok(Json(response))
}

/// POST /detect/audio
pub async fn detect_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<DetectionResponse>> {
    let upload = read_upload(multipart, "unknown.wav").await?;
    check_upload(
        &upload,
        &[
            "audio/wav",
            "audio/x-wav",
            "audio/wave",
            "audio/vnd.wave",
            "audio/vnd.wav",
        ],
        &[".wav"],
        state.config.max_audio_bytes,
        "audio",
    )?;

    let response = run_detection(
        &state,
        DetectionInput {
            content_type: ContentType::Audio,
            text: None,
            binary: Some(&upload.data),
            filename: Some(&upload.filename),
            source: Source::Api,
            source_url: None,
        },
        request_id(&headers),
    )
    .await?;
    Ok(Json(response))
}

/// POST /detect/video
pub async fn detect_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<DetectionResponse>> {
    let upload = read_upload(multipart, "unknown.mp4").await?;
    check_upload(
        &upload,
        &[
            "video/mp4",
            "video/webm",
            "video/quicktime",
            "video/x-msvideo",
            "video/x-matroska",
        ],
        &[".mp4", ".webm", ".mov", ".avi", ".mkv"],
        state.config.max_video_bytes,
        "video",
    )?;

    let response = run_detection(
        &state,
        DetectionInput {
            content_type: ContentType::Video,
            text: None,
            binary: Some(&upload.data),
            filename: Some(&upload.filename),
            source: Source::Api,
            source_url: None,
        },
        request_id(&headers),
    )
    .await?;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// URL detection
// ---------------------------------------------------------------------------

/// POST /detect/url
///
/// Fetches the URL and routes the content to the text or image path.
pub async fn detect_url(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DetectUrlRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let response = state
        .http_client
        .get(&request.url)
        .header("User-Agent", "provtrack/0.1")
        .send()
        .await
        .map_err(|e| AppError::Core(CoreError::validation(format!("failed to fetch URL: {e}"))))?;

    if !response.status().is_success() {
        return Err(AppError::Core(CoreError::validation(format!(
            "URL returned status code {}",
            response.status().as_u16()
        ))));
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_lowercase())
        .unwrap_or_default();
    let resolved_url = response.url().to_string();
    let request_id = request_id(&headers);

    if content_type.starts_with("image/") {
        let data = response
            .bytes()
            .await
            .map_err(|e| AppError::Core(CoreError::validation(format!("failed to read URL body: {e}"))))?;
        if data.len() > state.config.max_image_bytes {
            return Err(AppError::Core(CoreError::InputTooLarge(format!(
                "image exceeds maximum size of {} MiB",
                state.config.max_image_bytes / (1024 * 1024)
            ))));
        }
        let filename = filename_from_url(&resolved_url);
        let detection = run_detection(
            &state,
            DetectionInput {
                content_type: ContentType::Image,
                text: None,
                binary: Some(&data),
                filename: Some(&filename),
                source: Source::Url,
                source_url: Some(resolved_url.clone()),
            },
            request_id,
        )
        .await?;
        return Ok(Json(json!({
            "analysis_id": detection.analysis_id,
            "content_type": "image",
            "url": resolved_url,
            "result": detection,
        })));
    }

    let raw = response
        .text()
        .await
        .map_err(|e| AppError::Core(CoreError::validation(format!("failed to read URL body: {e}"))))?;
    let mut text = if content_type.contains("html") {
        strip_html(&raw)
    } else {
        raw
    };
    text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return Err(AppError::Core(CoreError::validation(
            "no analyzable text found at URL",
        )));
    }
    if text.chars().count() > state.config.max_text_length {
        text = text.chars().take(state.config.max_text_length).collect();
    }

    let text_len = text.chars().count();
    let detection = run_detection(
        &state,
        DetectionInput {
            content_type: ContentType::Text,
            text: Some(&text),
            binary: None,
            filename: None,
            source: Source::Url,
            source_url: Some(resolved_url.clone()),
        },
        request_id,
    )
    .await?;
    Ok(Json(json!({
        "analysis_id": detection.analysis_id,
        "content_type": "text",
        "url": resolved_url,
        "result": detection,
        "text_length": text_len,
    })))
}

/// Drop tags, scripts, and styles from an HTML document.
fn strip_html(html: &str) -> String {
    let without_blocks = remove_element(&remove_element(html, "script"), "style");
    let mut out = String::with_capacity(without_blocks.len());
    let mut in_tag = false;
    for c in without_blocks.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Remove `<tag ...>...</tag>` elements wholesale, case-insensitively.
///
/// Pattern matching runs on an ASCII-lowercased byte copy; every boundary
/// index lands on an ASCII byte, so slicing the original is safe.
fn remove_element(html: &str, tag: &str) -> String {
    let lower: Vec<u8> = html.bytes().map(|b| b.to_ascii_lowercase()).collect();
    let open: Vec<u8> = format!("<{tag}").into_bytes();
    let close: Vec<u8> = format!("</{tag}").into_bytes();

    let mut out = String::with_capacity(html.len());
    let mut pos = 0usize;
    while let Some(start) = find_bytes(&lower[pos..], &open).map(|i| pos + i) {
        out.push_str(&html[pos..start]);
        let after_close = find_bytes(&lower[start..], &close)
            .map(|i| start + i + close.len())
            .and_then(|i| lower[i..].iter().position(|&b| b == b'>').map(|j| i + j + 1));
        match after_close {
            Some(end) => pos = end,
            None => return out,
        }
    }
    out.push_str(&html[pos..]);
    out
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn filename_from_url(url: &str) -> String {
    url.split('?')
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && name.contains('.'))
        .unwrap_or("downloaded_image")
        .to_string()
}

pub(crate) fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_stripping_removes_tags_and_scripts() {
        let html = "<html><head><script>var x = 1;</script><style>p{}</style></head>\
                    <body><p>Hello <b>world</b></p></body></html>";
        let text = strip_html(html);
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("p{}"));
    }

    #[test]
    fn filenames_come_from_the_url_path() {
        assert_eq!(
            filename_from_url("https://example.com/images/photo.png?w=100"),
            "photo.png"
        );
        assert_eq!(filename_from_url("https://example.com/"), "downloaded_image");
        assert_eq!(filename_from_url("https://example.com/page"), "downloaded_image");
    }
}
