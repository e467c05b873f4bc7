//! Shared application router builder.
//!
//! Both the production binary (`main.rs`) and integration tests build the
//! router here so they exercise the exact same middleware stack.

use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName};
use axum::http::{Method, StatusCode};
use axum::{middleware as axum_middleware, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::middleware::{audit, envelope, guard};
use crate::routes;
use crate::state::AppState;

/// Build the full application [`Router`] with all middleware layers.
///
/// Layer order (inner to outer): request audit, panic recovery, timeout,
/// error envelope, request-id propagation, tracing, request-id
/// generation, CORS. The envelope sits outside panic recovery and the
/// timeout so their synthesized responses are enveloped too, and inside
/// the request-id layers so it can read the generated id.
pub fn build_app_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state);
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        // Health check at root level (not under /api/v1, not metered).
        .merge(routes::health::router())
        // API v1 routes behind the API-key / rate / spend guard.
        .nest(
            "/api/v1",
            routes::api_routes().route_layer(axum_middleware::from_fn_with_state(
                state.clone(),
                guard::guard,
            )),
        )
        // HTTP request auditing.
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            audit::audit_requests,
        ))
        // Panic recovery: catch panics and return 500.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(state.config.request_timeout_secs),
        ))
        // Error envelope: uniform JSON shape for every 4xx/5xx.
        .layer(axum_middleware::from_fn(envelope::envelope_errors))
        // Propagate request ID to the response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state)
}

/// Build the CORS middleware layer from configuration.
///
/// Panics at startup on an invalid origin; misconfiguration must fail
/// fast.
fn build_cors_layer(state: &AppState) -> CorsLayer {
    let origins: Vec<_> = state
        .config
        .cors_origins
        .iter()
        .map(|origin| {
            origin
                .parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{origin}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("x-actor-id"),
        ])
        .expose_headers([
            HeaderName::from_static("x-request-id"),
            HeaderName::from_static("retry-after"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(600))
}
