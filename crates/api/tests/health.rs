//! Integration tests for the health endpoint and general HTTP behaviour.

mod common;

use axum::http::StatusCode;
use common::{assert_error_envelope, body_json, get};
use sqlx::PgPool;

#[sqlx::test(migrations = "../../db/migrations")]
async fn shallow_health_answers_from_memory(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = get(app, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
    assert!(json.get("checks").is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deep_health_reports_database_and_cache(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = get(app, "/health?deep=true").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["database"], "ok");
    assert_eq!(json["checks"]["cache"], "not_configured");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn unknown_route_gets_the_error_envelope(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = get(app, "/this-route-does-not-exist").await;

    let body = assert_error_envelope(response, StatusCode::NOT_FOUND, "NotFound").await;
    assert_eq!(body["path"], "/this-route-does-not-exist");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn responses_carry_a_request_id_header(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = get(app, "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("x-request-id header present");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}
