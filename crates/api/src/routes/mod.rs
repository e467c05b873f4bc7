//! Route definitions, one module per route group.

pub mod admin;
pub mod analyze;
pub mod batch;
pub mod detect;
pub mod health;
pub mod intel;

use axum::Router;

use crate::state::AppState;

/// All `/api/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/detect", detect::router())
        .nest("/batch", batch::router())
        .nest("/analyze", analyze::router())
        .nest("/intel", intel::router())
        .nest("/admin", admin::router())
}
