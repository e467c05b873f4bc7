//! Operator endpoints: rate-limit reset, retention pruning, kill-switch.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{Duration, Utc};
use provtrack_core::error::CoreError;
use provtrack_db::repositories::{AnalysisRepo, AuditEventRepo};
use serde::{Deserialize, Serialize};
use serde_json::json;

use provtrack_events::AuditEvent;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /admin/rate-limit/reset/{client_id}
pub async fn reset_rate_limit(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Json<serde_json::Value> {
    state.guard.reset(&client_id).await;
    state.audit.emit(
        AuditEvent::new("admin.rate_limit_reset").with_payload(json!({ "client_id": client_id })),
    );
    Json(json!({ "reset": client_id }))
}

#[derive(Debug, Deserialize)]
pub struct PruneRequest {
    pub older_than_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PruneResponse {
    pub older_than_days: i64,
    pub analyses_removed: u64,
    pub audit_events_removed: u64,
}

/// POST /admin/prune
///
/// Applies the TTL policy to both tables. Defaults to the configured
/// retention window.
pub async fn prune(
    State(state): State<AppState>,
    body: Option<Json<PruneRequest>>,
) -> AppResult<Json<PruneResponse>> {
    let days = body
        .and_then(|Json(r)| r.older_than_days)
        .unwrap_or(state.config.retention_days);
    if !(1..=3650).contains(&days) {
        return Err(AppError::Core(CoreError::validation(
            "older_than_days must be between 1 and 3650",
        )));
    }

    let cutoff = Utc::now() - Duration::days(days);
    let analyses_removed = AnalysisRepo::prune_older_than(&state.pool, cutoff).await?;
    let audit_events_removed = AuditEventRepo::prune_older_than(&state.pool, cutoff).await?;

    state.audit.emit(AuditEvent::new("admin.prune").with_payload(json!({
        "older_than_days": days,
        "analyses_removed": analyses_removed,
        "audit_events_removed": audit_events_removed,
    })));

    Ok(Json(PruneResponse {
        older_than_days: days,
        analyses_removed,
        audit_events_removed,
    }))
}

/// POST /admin/scheduler/clear-kill-switch
pub async fn clear_kill_switch(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.scheduler.clear_kill_switch().await;
    Json(json!({ "kill_switch_armed": false }))
}
