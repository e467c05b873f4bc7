//! Analysis record entity and DTOs.
//!
//! `content_type` and `source` are stored as TEXT and validated against the
//! core enums at the API boundary; the storage layer treats them as plain
//! strings.

use provtrack_core::alerts::{Alert, TimelineDay};
use provtrack_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One completed detection decision. Immutable once created.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnalysisRecord {
    pub analysis_id: String,
    pub content_type: String,
    pub content_hash: String,
    pub is_ai_generated: bool,
    pub confidence: f64,
    pub model_prediction: Option<String>,
    pub result_payload: serde_json::Value,
    pub source: String,
    pub source_url: Option<String>,
    pub filename: Option<String>,
    pub input_size: i64,
    pub created_at: Timestamp,
}

/// DTO for inserting a new analysis record.
#[derive(Debug, Clone)]
pub struct CreateAnalysis {
    pub analysis_id: String,
    pub content_type: String,
    pub content_hash: String,
    pub is_ai_generated: bool,
    pub confidence: f64,
    pub model_prediction: Option<String>,
    pub result_payload: serde_json::Value,
    pub source: String,
    pub source_url: Option<String>,
    pub filename: Option<String>,
    pub input_size: i64,
}

/// Outcome of an idempotent `put`: the stored id plus whether an existing
/// row inside the dedup window was reused.
#[derive(Debug, Clone, Serialize)]
pub struct PutOutcome {
    pub analysis_id: String,
    pub deduplicated: bool,
}

/// Filter parameters for history listing and export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisFilter {
    pub content_type: Option<String>,
    pub source: Option<String>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
}

/// Paginated listing result.
#[derive(Debug, Serialize)]
pub struct AnalysisPage {
    pub items: Vec<AnalysisRecord>,
    pub total: i64,
}

/// All-time aggregates for `/analyze/stats`.
#[derive(Debug, Serialize)]
pub struct StatsData {
    pub total_analyses: i64,
    pub ai_detected_count: i64,
    pub human_detected_count: i64,
    pub average_confidence: f64,
    pub by_type: Vec<CountByKey>,
}

/// Generic `(key, count)` aggregation row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CountByKey {
    pub key: String,
    pub count: i64,
}

/// Ranked model attribution row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ModelCount {
    pub model: String,
    pub count: i64,
}

/// Windowed aggregates for the dashboard.
#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub window_days: i64,
    pub summary: DashboardSummary,
    pub by_type_window: Vec<CountByKey>,
    pub by_source_window: Vec<CountByKey>,
    pub top_models_window: Vec<ModelCount>,
    pub timeline: Vec<TimelineDay>,
    pub alerts_window: Vec<Alert>,
}

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub total_analyses_all_time: i64,
    pub total_analyses_window: i64,
    pub ai_detected_window: i64,
    pub human_detected_window: i64,
    pub ai_rate_window: f64,
    pub average_confidence_window: f64,
}
