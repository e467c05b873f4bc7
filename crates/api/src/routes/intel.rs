//! Route definitions for intel collection.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::intel;
use crate::state::AppState;

/// Intel routes mounted at `/intel`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/x/collect/estimate", post(intel::estimate))
        .route("/scheduler/status", get(intel::scheduler_status))
        .route("/scheduler/trigger", post(intel::scheduler_trigger))
}
