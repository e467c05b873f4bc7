//! Route definitions for detection endpoints.

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::detect;
use crate::state::AppState;

/// Upper bound for multipart bodies; the precise per-modality caps are
/// enforced in the handlers with a 413.
const UPLOAD_BODY_LIMIT: usize = 200 * 1024 * 1024;

/// Detection routes mounted at `/detect`.
///
/// ```text
/// POST /text   -> detect_text
/// POST /image  -> detect_image
/// POST /audio  -> detect_audio
/// POST /video  -> detect_video
/// POST /url    -> detect_url
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/text", post(detect::detect_text))
        .route(
            "/image",
            post(detect::detect_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/audio",
            post(detect::detect_audio).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/video",
            post(detect::detect_video).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/url", post(detect::detect_url))
}
