//! Batch text detection.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use provtrack_core::error::CoreError;
use provtrack_core::types::{ContentType, Source, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::detect::{
    request_id, run_detection, validate_text, DetectionInput, DetectionResponse,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchTextRequest {
    pub items: Vec<BatchTextItem>,
    #[serde(default)]
    pub stop_on_error: bool,
}

#[derive(Debug, Deserialize)]
pub struct BatchTextItem {
    pub item_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct BatchTextResponse {
    pub batch_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub processed_at: Timestamp,
    pub items: Vec<BatchResultItem>,
}

#[derive(Debug, Serialize)]
pub struct BatchResultItem {
    pub item_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<DetectionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// POST /batch/text
///
/// Processes up to `max_batch_items` texts in request order. Items fail
/// independently unless `stop_on_error` is set.
pub async fn batch_text(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BatchTextRequest>,
) -> AppResult<Json<BatchTextResponse>> {
    if request.items.len() > state.config.max_batch_items {
        return Err(AppError::Core(CoreError::validation(format!(
            "batch exceeds maximum size of {} items",
            state.config.max_batch_items
        ))));
    }

    let request_id = request_id(&headers);
    let total = request.items.len();
    let mut items: Vec<BatchResultItem> = Vec::with_capacity(total);
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    for (index, item) in request.items.iter().enumerate() {
        let item_id = item
            .item_id
            .clone()
            .unwrap_or_else(|| index.to_string());
        let text = item.text.trim();

        let result = match validate_text(text, &state) {
            Ok(()) => {
                run_detection(
                    &state,
                    DetectionInput {
                        content_type: ContentType::Text,
                        text: Some(text),
                        binary: None,
                        filename: None,
                        source: Source::Batch,
                        source_url: None,
                    },
                    request_id.clone(),
                )
                .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                succeeded += 1;
                items.push(BatchResultItem {
                    item_id,
                    status: "ok",
                    result: Some(response),
                    error: None,
                });
            }
            Err(e) => {
                failed += 1;
                items.push(BatchResultItem {
                    item_id,
                    status: "error",
                    result: None,
                    error: Some(e.to_string()),
                });
                if request.stop_on_error {
                    break;
                }
            }
        }
    }

    Ok(Json(BatchTextResponse {
        batch_id: uuid::Uuid::new_v4().to_string(),
        total,
        succeeded,
        failed,
        processed_at: Utc::now(),
        items,
    }))
}
