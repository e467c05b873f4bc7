//! Integration tests for the analysis repository.

use chrono::Utc;
use provtrack_db::models::analysis::{AnalysisFilter, CreateAnalysis};
use provtrack_db::repositories::AnalysisRepo;
use sqlx::PgPool;

fn record(analysis_id: &str, content_hash: &str, is_ai: bool) -> CreateAnalysis {
    CreateAnalysis {
        analysis_id: analysis_id.to_string(),
        content_type: "text".to_string(),
        content_hash: content_hash.to_string(),
        is_ai_generated: is_ai,
        confidence: if is_ai { 0.8 } else { 0.2 },
        model_prediction: is_ai.then(|| "gpt-4".to_string()),
        result_payload: serde_json::json!({ "explanation": "test fixture" }),
        source: "api".to_string(),
        source_url: None,
        filename: None,
        input_size: 512,
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn put_then_get_round_trips_every_field(pool: PgPool) {
    let create = record("a-1", "hash-1", true);
    let outcome = AnalysisRepo::put(&pool, &create, 3600).await.unwrap();
    assert_eq!(outcome.analysis_id, "a-1");
    assert!(!outcome.deduplicated);

    let stored = AnalysisRepo::find_by_id(&pool, "a-1").await.unwrap().unwrap();
    assert_eq!(stored.analysis_id, create.analysis_id);
    assert_eq!(stored.content_type, create.content_type);
    assert_eq!(stored.content_hash, create.content_hash);
    assert_eq!(stored.is_ai_generated, create.is_ai_generated);
    assert_eq!(stored.confidence, create.confidence);
    assert_eq!(stored.model_prediction, create.model_prediction);
    assert_eq!(stored.result_payload, create.result_payload);
    assert_eq!(stored.source, create.source);
    assert_eq!(stored.input_size, create.input_size);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn put_inside_the_dedup_window_returns_the_existing_id(pool: PgPool) {
    AnalysisRepo::put(&pool, &record("a-1", "same-hash", true), 3600)
        .await
        .unwrap();
    let second = AnalysisRepo::put(&pool, &record("a-2", "same-hash", true), 3600)
        .await
        .unwrap();

    assert_eq!(second.analysis_id, "a-1");
    assert!(second.deduplicated);
    assert!(AnalysisRepo::find_by_id(&pool, "a-2").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn zero_dedup_window_disables_deduplication(pool: PgPool) {
    AnalysisRepo::put(&pool, &record("a-1", "same-hash", true), 0)
        .await
        .unwrap();
    let second = AnalysisRepo::put(&pool, &record("a-2", "same-hash", true), 0)
        .await
        .unwrap();
    assert_eq!(second.analysis_id, "a-2");
    assert!(!second.deduplicated);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn put_is_idempotent_on_analysis_id(pool: PgPool) {
    AnalysisRepo::put(&pool, &record("a-1", "h1", true), 0)
        .await
        .unwrap();
    // Same id, different hash, no dedup window: the insert is a no-op.
    AnalysisRepo::put(&pool, &record("a-1", "h2", false), 0)
        .await
        .unwrap();

    let stored = AnalysisRepo::find_by_id(&pool, "a-1").await.unwrap().unwrap();
    assert_eq!(stored.content_hash, "h1");
    assert!(stored.is_ai_generated);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_filters_and_counts_consistently(pool: PgPool) {
    for i in 0..3 {
        AnalysisRepo::put(&pool, &record(&format!("t-{i}"), &format!("h-{i}"), true), 0)
            .await
            .unwrap();
    }
    let mut image = record("img-1", "h-img", false);
    image.content_type = "image".to_string();
    image.source = "url".to_string();
    AnalysisRepo::put(&pool, &image, 0).await.unwrap();

    let filter = AnalysisFilter {
        content_type: Some("text".to_string()),
        ..Default::default()
    };
    let items = AnalysisRepo::list(&pool, &filter, 10, 0).await.unwrap();
    let total = AnalysisRepo::count(&pool, &filter).await.unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(total, 3);

    let filter = AnalysisFilter {
        source: Some("url".to_string()),
        ..Default::default()
    };
    assert_eq!(AnalysisRepo::count(&pool, &filter).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn dashboard_summary_matches_the_timeline(pool: PgPool) {
    for i in 0..5 {
        AnalysisRepo::put(&pool, &record(&format!("d-{i}"), &format!("h-{i}"), i % 2 == 0), 0)
            .await
            .unwrap();
    }

    let data = AnalysisRepo::dashboard(&pool, 14).await.unwrap();
    assert_eq!(data.timeline.len(), 14);

    let timeline_total: i64 = data.timeline.iter().map(|d| d.total).sum();
    assert_eq!(timeline_total, data.summary.total_analyses_window);
    assert_eq!(
        data.summary.ai_detected_window + data.summary.human_detected_window,
        data.summary.total_analyses_window
    );
    assert_eq!(data.summary.total_analyses_window, 5);
    assert_eq!(data.summary.ai_detected_window, 3);

    // gpt-4 is the only attributed model.
    assert_eq!(data.top_models_window[0].model, "gpt-4");
    assert_eq!(data.top_models_window[0].count, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn prune_removes_rows_older_than_the_cutoff(pool: PgPool) {
    AnalysisRepo::put(&pool, &record("old", "h-old", true), 0)
        .await
        .unwrap();
    AnalysisRepo::put(&pool, &record("new", "h-new", true), 0)
        .await
        .unwrap();
    sqlx::query("UPDATE analysis_records SET created_at = NOW() - INTERVAL '100 days' \
                 WHERE analysis_id = 'old'")
        .execute(&pool)
        .await
        .unwrap();

    let removed = AnalysisRepo::prune_older_than(&pool, Utc::now() - chrono::Duration::days(90))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert!(AnalysisRepo::find_by_id(&pool, "old").await.unwrap().is_none());
    assert!(AnalysisRepo::find_by_id(&pool, "new").await.unwrap().is_some());
}
