// Shared test helpers. Not every test binary uses every helper, so
// dead_code warnings are suppressed at the module level.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use provtrack_api::config::{AppConfig, ProviderConfig};
use provtrack_api::limiter::GuardHandle;
use provtrack_api::router::build_app_router;
use provtrack_api::state::AppState;
use provtrack_consensus::{ConsensusEngine, Thresholds};
use provtrack_core::ratelimit::GuardConfig;
use provtrack_events::intel::{XIntelCollector, XIntelConfig};
use provtrack_events::scheduler::SchedulerConfig;
use provtrack_events::webhook::WebhookConfig;
use provtrack_events::{AuditHub, AuditPersistence, IntelScheduler, WebhookDispatcher};

/// Build a test `AppConfig` with safe defaults and scratch data files.
pub fn test_config() -> AppConfig {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let data = dir.path().to_path_buf();
    // Keep the scratch directory alive for the whole test process.
    std::mem::forget(dir);

    let no_provider = |url: &str| ProviderConfig {
        api_url: url.to_string(),
        api_key: None,
        weight: 0.4,
    };

    AppConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,

        database_url: "postgres://unused-in-tests".to_string(),
        cache_url: None,

        require_api_key: false,
        api_keys: Vec::new(),
        guard: GuardConfig::default(),

        min_text_length: 50,
        max_text_length: 50_000,
        max_image_bytes: 10 * 1024 * 1024,
        max_audio_bytes: 25 * 1024 * 1024,
        max_video_bytes: 150 * 1024 * 1024,
        max_batch_items: 50,

        consensus_enabled: true,
        provider_timeout: Duration::from_secs(2),
        provider_retry_attempts: 1,
        provider_retry_backoff: Duration::from_millis(10),
        internal_weight: 0.6,
        thresholds: Thresholds::default(),
        copyleaks: no_provider("http://localhost:1/copyleaks"),
        reality_defender: no_provider("http://localhost:1/rd"),
        hive: no_provider("http://localhost:1/hive"),
        c2pa_enabled: false,
        c2pa_tool_path: "c2patool".to_string(),
        c2pa_weight: 0.5,
        c2pa_verify_timeout: Duration::from_secs(2),

        dedup_window_seconds: 3600,
        retention_days: 90,

        audit_enabled: true,
        audit_ring_capacity: 1000,
        audit_log_http_requests: true,

        scheduler: SchedulerConfig {
            enabled: false,
            usage_file: data.join("scheduler_usage.json"),
            ..Default::default()
        },
        webhook: WebhookConfig {
            urls: Vec::new(),
            queue_file: data.join("webhook_queue.json"),
            dead_letter_file: data.join("webhook_dead_letter.jsonl"),
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            ..Default::default()
        },
        intel: XIntelConfig::default(),
    }
}

/// Build the shared state with an internal-only consensus engine and a
/// live audit persistence task.
pub async fn build_test_state(pool: PgPool, config: AppConfig) -> AppState {
    let config = Arc::new(config);
    let audit = Arc::new(AuditHub::new(
        config.audit_enabled,
        config.audit_ring_capacity,
    ));
    tokio::spawn(AuditPersistence::run(pool.clone(), audit.subscribe()));

    let engine = Arc::new(ConsensusEngine::new(
        config.internal_weight,
        config.consensus_enabled,
        config.provider_timeout,
        config.thresholds,
        Vec::new(),
    ));
    let webhooks = Arc::new(WebhookDispatcher::new(config.webhook.clone(), Arc::clone(&audit)).await);
    let collector = Arc::new(XIntelCollector::new(config.intel.clone()));
    let scheduler = Arc::new(
        IntelScheduler::new(
            config.scheduler.clone(),
            pool.clone(),
            Arc::clone(&engine),
            collector,
            Arc::clone(&audit),
            Arc::clone(&webhooks),
            CancellationToken::new(),
        )
        .await,
    );

    AppState {
        pool,
        guard: Arc::new(GuardHandle::in_process(config.guard.clone())),
        config,
        engine,
        audit,
        webhooks,
        scheduler,
        http_client: reqwest::Client::new(),
    }
}

/// Full application router with default test configuration.
pub async fn build_test_app(pool: PgPool) -> Router {
    build_test_app_with(pool, test_config()).await
}

/// Full application router with a customized configuration.
pub async fn build_test_app_with(pool: PgPool, config: AppConfig) -> Router {
    build_app_router(build_test_state(pool, config).await)
}

/// Issue a GET request against the in-memory app.
pub async fn get(app: Router, path: &str) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .uri(path)
            .body(Body::empty())
            .expect("request builds"),
    )
    .await
    .expect("request succeeds")
}

/// Issue a JSON POST request against the in-memory app.
pub async fn post_json(
    app: Router,
    path: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds"),
    )
    .await
    .expect("request succeeds")
}

/// Decode a response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collects")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is JSON")
}

/// Build a multipart body with a single `file` part.
pub fn multipart_body(filename: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "provtrack-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

/// Assert the standard error envelope shape and return it.
pub async fn assert_error_envelope(
    response: axum::response::Response,
    status: StatusCode,
    error: &str,
) -> serde_json::Value {
    assert_eq!(response.status(), status);
    let body = body_json(response).await;
    assert_eq!(body["error"], error, "envelope: {body}");
    assert_eq!(body["status_code"], status.as_u16());
    assert!(body["request_id"].is_string());
    assert!(body["path"].is_string());
    body
}
