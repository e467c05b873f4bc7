//! Analysis history, dashboard, export, and audit query endpoints.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use provtrack_core::error::CoreError;
use provtrack_core::types::{ContentType, Source, Timestamp};
use provtrack_db::models::analysis::{AnalysisFilter, AnalysisPage, AnalysisRecord};
use provtrack_db::models::audit_event::{AuditEventFilter, AuditEventPage};
use provtrack_db::repositories::{AnalysisRepo, AuditEventRepo};
use provtrack_events::ring::TailFilter;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub content_type: Option<String>,
    pub source: Option<String>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub items: Vec<HistoryItem>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Compact listing row derived from a full record.
#[derive(Debug, Serialize)]
pub struct HistoryItem {
    pub analysis_id: String,
    pub content_type: String,
    pub is_ai_generated: bool,
    pub confidence: f64,
    pub model_prediction: Option<String>,
    pub created_at: Timestamp,
    pub source: String,
    pub source_url: Option<String>,
    pub explanation: Option<String>,
}

impl From<AnalysisRecord> for HistoryItem {
    fn from(record: AnalysisRecord) -> Self {
        let explanation = record
            .result_payload
            .get("explanation")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        Self {
            analysis_id: record.analysis_id,
            content_type: record.content_type,
            is_ai_generated: record.is_ai_generated,
            confidence: record.confidence,
            model_prediction: record.model_prediction,
            created_at: record.created_at,
            source: record.source,
            source_url: record.source_url,
            explanation,
        }
    }
}

fn build_filter(
    content_type: &Option<String>,
    source: &Option<String>,
    since: Option<Timestamp>,
    until: Option<Timestamp>,
) -> Result<AnalysisFilter, AppError> {
    if let Some(ct) = content_type.as_deref() {
        if ContentType::parse(ct).is_none() {
            return Err(AppError::Core(CoreError::validation(format!(
                "unknown content_type '{ct}'"
            ))));
        }
    }
    if let Some(s) = source.as_deref() {
        if Source::parse(s).is_none() {
            return Err(AppError::Core(CoreError::validation(format!(
                "unknown source '{s}'"
            ))));
        }
    }
    Ok(AnalysisFilter {
        content_type: content_type.clone(),
        source: source.clone(),
        since,
        until,
    })
}

/// GET /analyze/history
pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<HistoryResponse>> {
    let filter = build_filter(&params.content_type, &params.source, params.since, params.until)?;
    let limit = params.limit.unwrap_or(10).clamp(1, 500);
    let offset = params.offset.unwrap_or(0).max(0);

    let records = AnalysisRepo::list(&state.pool, &filter, limit, offset).await?;
    let total = AnalysisRepo::count(&state.pool, &filter).await?;

    Ok(Json(HistoryResponse {
        items: records.into_iter().map(HistoryItem::from).collect(),
        total,
        limit,
        offset,
    }))
}

/// GET /analyze/record/{analysis_id}
pub async fn get_record(
    State(state): State<AppState>,
    Path(analysis_id): Path<String>,
) -> AppResult<Json<AnalysisRecord>> {
    let record = AnalysisRepo::find_by_id(&state.pool, &analysis_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "analysis",
            id: analysis_id,
        }))?;
    Ok(Json(record))
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// GET /analyze/stats
pub async fn stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = AnalysisRepo::stats(&state.pool).await?;
    Ok(Json(stats))
}

#[derive(Debug, Deserialize)]
pub struct DashboardParams {
    pub days: Option<i64>,
}

/// GET /analyze/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> AppResult<impl IntoResponse> {
    let days = params.days.unwrap_or(14);
    if !(1..=90).contains(&days) {
        return Err(AppError::Core(CoreError::validation(
            "days must be between 1 and 90",
        )));
    }
    let data = AnalysisRepo::dashboard(&state.pool, days).await?;
    Ok(Json(data))
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
    pub content_type: Option<String>,
    pub source: Option<String>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
    pub row_cap: Option<i64>,
}

/// GET /analyze/export?format=csv|json
pub async fn export(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> AppResult<impl IntoResponse> {
    let filter = build_filter(&params.content_type, &params.source, params.since, params.until)?;
    let records = AnalysisRepo::export(
        &state.pool,
        &filter,
        params
            .row_cap
            .unwrap_or(provtrack_db::repositories::EXPORT_ROW_CAP),
    )
    .await?;

    match params.format.as_deref().unwrap_or("json") {
        "csv" => {
            let mut csv_output = String::from(
                "analysis_id,content_type,content_hash,is_ai_generated,confidence,\
                 model_prediction,source,source_url,filename,input_size,created_at\n",
            );
            for record in &records {
                csv_output.push_str(&format!(
                    "{},{},{},{},{},{},{},{},{},{},{}\n",
                    record.analysis_id,
                    record.content_type,
                    record.content_hash,
                    record.is_ai_generated,
                    record.confidence,
                    csv_field(record.model_prediction.as_deref()),
                    record.source,
                    csv_field(record.source_url.as_deref()),
                    csv_field(record.filename.as_deref()),
                    record.input_size,
                    record.created_at.to_rfc3339(),
                ));
            }
            Ok(axum::response::Response::builder()
                .status(200)
                .header("Content-Type", "text/csv")
                .header(
                    "Content-Disposition",
                    "attachment; filename=\"analysis-export.csv\"",
                )
                .body(axum::body::Body::from(csv_output))
                .expect("static response always builds")
                .into_response())
        }
        _ => Ok(Json(AnalysisPage {
            total: records.len() as i64,
            items: records,
        })
        .into_response()),
    }
}

/// Quote a CSV field when it contains separators.
fn csv_field(value: Option<&str>) -> String {
    let value = value.unwrap_or("");
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Audit events
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct AuditQueryParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub event_type: Option<String>,
    pub severity: Option<String>,
    pub actor_id: Option<String>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
}

/// GET /analyze/events
pub async fn audit_events(
    State(state): State<AppState>,
    Query(params): Query<AuditQueryParams>,
) -> AppResult<Json<AuditEventPage>> {
    let filter = AuditEventFilter {
        event_type: params.event_type,
        severity: params.severity,
        actor_id: params.actor_id,
        since: params.since,
        until: params.until,
    };
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let offset = params.offset.unwrap_or(0).max(0);

    let items = AuditEventRepo::query(&state.pool, &filter, limit, offset).await?;
    let total = AuditEventRepo::count(&state.pool, &filter).await?;
    Ok(Json(AuditEventPage { items, total }))
}

#[derive(Debug, Deserialize)]
pub struct TailParams {
    pub limit: Option<usize>,
    pub event_type: Option<String>,
    pub severity: Option<String>,
}

/// GET /analyze/events/tail
///
/// Served from the in-memory ring; no database access.
pub async fn audit_tail(
    State(state): State<AppState>,
    Query(params): Query<TailParams>,
) -> Json<serde_json::Value> {
    let filter = TailFilter {
        event_type: params.event_type,
        severity: params.severity,
    };
    let events = state
        .audit
        .ring()
        .tail(params.limit.unwrap_or(50).clamp(1, 1000), &filter);
    Json(serde_json::json!({
        "items": events,
        "ring_capacity": state.audit.ring().capacity(),
    }))
}
