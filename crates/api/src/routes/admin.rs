//! Route definitions for operator endpoints.

use axum::routing::post;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Admin routes mounted at `/admin`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rate-limit/reset/{client_id}", post(admin::reset_rate_limit))
        .route("/prune", post(admin::prune))
        .route(
            "/scheduler/clear-kill-switch",
            post(admin::clear_kill_switch),
        )
}
