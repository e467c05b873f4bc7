//! Intel endpoints: request-plan estimation and scheduler control.

use axum::extract::State;
use axum::Json;
use provtrack_core::error::CoreError;
use provtrack_core::estimate;
use serde::{Deserialize, Serialize};

use provtrack_events::scheduler::{RunReport, SchedulerStatus};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    pub window_days: u32,
    pub max_posts: u32,
    pub max_pages: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct EstimateResponse {
    pub window_days: u32,
    pub max_posts: u32,
    #[serde(flatten)]
    pub plan: estimate::RequestPlan,
    pub monthly_request_cap: u32,
    pub requests_used_this_month: u32,
}

/// POST /intel/x/collect/estimate
///
/// Pure computation; never touches the upstream API.
pub async fn estimate(
    State(state): State<AppState>,
    Json(request): Json<EstimateRequest>,
) -> AppResult<Json<EstimateResponse>> {
    if !(1..=90).contains(&request.window_days) {
        return Err(AppError::Core(CoreError::validation(
            "window_days must be between 1 and 90",
        )));
    }
    if !(1..=5000).contains(&request.max_posts) {
        return Err(AppError::Core(CoreError::validation(
            "max_posts must be between 1 and 5000",
        )));
    }

    let page_cap = request.max_pages.unwrap_or(state.config.intel.max_pages);
    let plan = estimate::request_plan(request.max_posts, page_cap);
    let status = state.scheduler.status().await;

    Ok(Json(EstimateResponse {
        window_days: request.window_days,
        max_posts: request.max_posts,
        plan,
        monthly_request_cap: status.monthly_request_cap,
        requests_used_this_month: status.usage.requests_used,
    }))
}

/// GET /intel/scheduler/status
pub async fn scheduler_status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status().await)
}

#[derive(Debug, Deserialize, Default)]
pub struct TriggerRequest {
    pub handle: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub triggered: usize,
    pub results: Vec<RunReport>,
}

/// POST /intel/scheduler/trigger
///
/// Runs one job (or all registered jobs) immediately, within the same
/// budget and single-flight rules the tick applies.
pub async fn scheduler_trigger(
    State(state): State<AppState>,
    body: Option<Json<TriggerRequest>>,
) -> AppResult<Json<TriggerResponse>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let results = state.scheduler.trigger(request.handle.as_deref()).await;
    Ok(Json(TriggerResponse {
        triggered: results.len(),
        results,
    }))
}
