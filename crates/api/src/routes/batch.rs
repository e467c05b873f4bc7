//! Route definitions for batch processing.

use axum::routing::post;
use axum::Router;

use crate::handlers::batch;
use crate::state::AppState;

/// Batch routes mounted at `/batch`.
pub fn router() -> Router<AppState> {
    Router::new().route("/text", post(batch::batch_text))
}
