//! HTTP request auditing.
//!
//! Emits one `http.request` audit event per API request with method, path,
//! status, and timing. Health probes are skipped to keep the trail useful.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use provtrack_core::types::Severity;
use serde_json::json;

use provtrack_events::AuditEvent;

use crate::state::AppState;

const SKIP_PREFIXES: [&str; 1] = ["/health"];

pub async fn audit_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !state.config.audit_enabled || !state.config.audit_log_http_requests {
        return next.run(req).await;
    }

    let path = req.uri().path().to_string();
    if SKIP_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();
    let actor_id = header(&req, "x-actor-id");
    let request_id = header(&req, "x-request-id");
    let client_ip = header(&req, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()));

    let started = Instant::now();
    let response = next.run(req).await;
    let status_code = response.status().as_u16();

    let severity = if status_code >= 500 {
        Severity::Error
    } else if status_code >= 400 {
        Severity::Warning
    } else {
        Severity::Info
    };

    state.audit.emit(
        AuditEvent::new("http.request")
            .with_severity(severity)
            .with_actor(actor_id)
            .with_request_id(request_id)
            .with_payload(json!({
                "method": method,
                "path": path,
                "query": query,
                "status_code": status_code,
                "duration_ms": started.elapsed().as_secs_f64() * 1000.0,
                "client_ip": client_ip,
            })),
    );

    response
}

fn header(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
