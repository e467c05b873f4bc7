//! Route definitions for analysis history and analytics.

use axum::routing::get;
use axum::Router;

use crate::handlers::analyze;
use crate::state::AppState;

/// Analysis routes mounted at `/analyze`.
///
/// ```text
/// GET /history              -> history
/// GET /record/{analysis_id} -> get_record
/// GET /stats                -> stats
/// GET /dashboard            -> dashboard
/// GET /export               -> export
/// GET /events               -> audit_events
/// GET /events/tail          -> audit_tail
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/history", get(analyze::history))
        .route("/record/{analysis_id}", get(analyze::get_record))
        .route("/stats", get(analyze::stats))
        .route("/dashboard", get(analyze::dashboard))
        .route("/export", get(analyze::export))
        .route("/events", get(analyze::audit_events))
        .route("/events/tail", get(analyze::audit_tail))
}
