//! Integration tests for the detection endpoints.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{assert_error_envelope, body_json, get, multipart_body, post_json};
use provtrack_core::hashing::content_hash_text;
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

/// 512 ASCII characters, the happy-path seed input.
fn sample_text() -> String {
    let sentence = "The quick brown fox jumps over the lazy dog near the river bank. ";
    let mut text = String::new();
    while text.len() < 512 {
        text.push_str(sentence);
    }
    text.truncate(512);
    text
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn text_detection_happy_path(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let text = sample_text();
    let response = post_json(app, "/api/v1/detect/text", json!({ "text": text })).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let analysis_id = body["analysis_id"].as_str().expect("analysis_id present");
    assert!(!analysis_id.is_empty());

    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));
    assert_eq!(
        body["is_ai_generated"].as_bool().unwrap(),
        confidence >= 0.5
    );

    let providers = body["consensus"]["providers"].as_array().unwrap();
    assert_eq!(providers[0]["provider"], "internal");
    assert_eq!(providers[0]["status"], "ok");

    // The record must exist with the hash of the trimmed text.
    let stored: (String, bool) = sqlx::query_as(
        "SELECT content_hash, is_ai_generated FROM analysis_records WHERE analysis_id = $1",
    )
    .bind(analysis_id)
    .fetch_one(&pool)
    .await
    .expect("record persisted");
    assert_eq!(stored.0, content_hash_text(&text));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn repeated_text_within_the_dedup_window_reuses_the_record(pool: PgPool) {
    let text = sample_text();

    let app = common::build_test_app(pool.clone()).await;
    let first = body_json(post_json(app, "/api/v1/detect/text", json!({ "text": text })).await).await;

    let app = common::build_test_app(pool.clone()).await;
    let second =
        body_json(post_json(app, "/api/v1/detect/text", json!({ "text": text })).await).await;

    assert_eq!(first["analysis_id"], second["analysis_id"]);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM analysis_records")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn short_text_fails_validation_with_field_list(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = post_json(app, "/api/v1/detect/text", json!({ "text": "too short" })).await;

    let body = assert_error_envelope(
        response,
        StatusCode::UNPROCESSABLE_ENTITY,
        "ValidationFailed",
    )
    .await;
    let fields = body["detail"].as_array().expect("per-field detail");
    assert_eq!(fields[0]["field"], "text");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn image_upload_round_trips(pool: PgPool) {
    let app = common::build_test_app(pool).await;

    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend_from_slice(&[0x42u8; 4096]);
    let (content_type, body) = multipart_body("sample.png", "image/png", &png);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/detect/image")
                .header("Content-Type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["confidence"].is_f64());
    assert_eq!(json["analysis"]["container"], "png");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn wrong_upload_type_is_rejected(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let (content_type, body) = multipart_body("notes.txt", "text/plain", b"plain text");

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/detect/image")
                .header("Content-Type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_error_envelope(
        response,
        StatusCode::UNPROCESSABLE_ENTITY,
        "ValidationFailed",
    )
    .await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn oversized_image_is_rejected_as_too_large(pool: PgPool) {
    let mut config = common::test_config();
    config.max_image_bytes = 1024;
    let app = common::build_test_app_with(pool, config).await;

    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend_from_slice(&[0u8; 4096]);
    let (content_type, body) = multipart_body("big.png", "image/png", &png);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/detect/image")
                .header("Content-Type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_error_envelope(response, StatusCode::PAYLOAD_TOO_LARGE, "InputTooLarge").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fetching_a_stored_record_by_id(pool: PgPool) {
    let app = common::build_test_app(pool.clone()).await;
    let created =
        body_json(post_json(app, "/api/v1/detect/text", json!({ "text": sample_text() })).await)
            .await;
    let analysis_id = created["analysis_id"].as_str().unwrap();

    let app = common::build_test_app(pool.clone()).await;
    let response = get(app, &format!("/api/v1/analyze/record/{analysis_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let record = body_json(response).await;
    assert_eq!(record["analysis_id"], *analysis_id);
    assert_eq!(record["content_type"], "text");
    assert_eq!(record["source"], "api");

    let app = common::build_test_app(pool).await;
    let missing = get(app, "/api/v1/analyze/record/no-such-id").await;
    assert_error_envelope(missing, StatusCode::NOT_FOUND, "NotFound").await;
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn batch_mixes_successes_and_failures(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = post_json(
        app,
        "/api/v1/batch/text",
        json!({
            "items": [
                { "item_id": "good", "text": sample_text() },
                { "item_id": "bad", "text": "way too short" },
            ]
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["items"][0]["status"], "ok");
    assert_eq!(body["items"][1]["status"], "error");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn batch_stop_on_error_halts_processing(pool: PgPool) {
    let app = common::build_test_app(pool).await;
    let response = post_json(
        app,
        "/api/v1/batch/text",
        json!({
            "stop_on_error": true,
            "items": [
                { "item_id": "bad", "text": "short" },
                { "item_id": "never-reached", "text": sample_text() },
            ]
        }),
    )
    .await;

    let body = body_json(response).await;
    assert_eq!(body["failed"], 1);
    assert_eq!(body["succeeded"], 0);
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
}
