//! Repository for the `analysis_records` table.

use chrono::{Duration, NaiveDate, Utc};
use provtrack_core::alerts::{self, TimelineDay};
use provtrack_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::analysis::{
    AnalysisFilter, AnalysisRecord, CountByKey, CreateAnalysis, DashboardData, DashboardSummary,
    ModelCount, PutOutcome, StatsData,
};

/// Column list for SELECT queries.
const COLUMNS: &str = "\
    analysis_id, content_type, content_hash, is_ai_generated, confidence, \
    model_prediction, result_payload, source, source_url, filename, \
    input_size, created_at";

/// Hard cap applied to export queries.
pub const EXPORT_ROW_CAP: i64 = 10_000;

/// Query and insert operations for analysis records.
pub struct AnalysisRepo;

impl AnalysisRepo {
    /// Idempotent insert.
    ///
    /// When a record with the same `(content_type, content_hash)` exists
    /// inside the dedup window, its id is returned and nothing is written.
    /// Two concurrent inserts may still both land; the oldest row wins on
    /// later lookups and duplicates age out via pruning.
    pub async fn put(
        pool: &PgPool,
        create: &CreateAnalysis,
        dedup_window_seconds: u64,
    ) -> Result<PutOutcome, sqlx::Error> {
        if dedup_window_seconds > 0 {
            let cutoff = Utc::now() - Duration::seconds(dedup_window_seconds as i64);
            let existing: Option<String> = sqlx::query_scalar(
                "SELECT analysis_id FROM analysis_records \
                 WHERE content_type = $1 AND content_hash = $2 AND created_at >= $3 \
                 ORDER BY created_at ASC LIMIT 1",
            )
            .bind(&create.content_type)
            .bind(&create.content_hash)
            .bind(cutoff)
            .fetch_optional(pool)
            .await?;

            if let Some(analysis_id) = existing {
                return Ok(PutOutcome {
                    analysis_id,
                    deduplicated: true,
                });
            }
        }

        sqlx::query(
            "INSERT INTO analysis_records \
             (analysis_id, content_type, content_hash, is_ai_generated, confidence, \
              model_prediction, result_payload, source, source_url, filename, input_size) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (analysis_id) DO NOTHING",
        )
        .bind(&create.analysis_id)
        .bind(&create.content_type)
        .bind(&create.content_hash)
        .bind(create.is_ai_generated)
        .bind(create.confidence)
        .bind(&create.model_prediction)
        .bind(&create.result_payload)
        .bind(&create.source)
        .bind(&create.source_url)
        .bind(&create.filename)
        .bind(create.input_size)
        .execute(pool)
        .await?;

        Ok(PutOutcome {
            analysis_id: create.analysis_id.clone(),
            deduplicated: false,
        })
    }

    /// Fetch one record by id.
    pub async fn find_by_id(
        pool: &PgPool,
        analysis_id: &str,
    ) -> Result<Option<AnalysisRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM analysis_records WHERE analysis_id = $1");
        sqlx::query_as::<_, AnalysisRecord>(&query)
            .bind(analysis_id)
            .fetch_optional(pool)
            .await
    }

    /// Paginated history listing, newest first.
    pub async fn list(
        pool: &PgPool,
        filter: &AnalysisFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AnalysisRecord>, sqlx::Error> {
        let limit = limit.clamp(1, 500);
        let offset = offset.max(0);
        let (where_clause, binds, next_idx) = build_filter(filter);

        let query = format!(
            "SELECT {COLUMNS} FROM analysis_records {where_clause} \
             ORDER BY created_at DESC \
             LIMIT ${next_idx} OFFSET ${}",
            next_idx + 1
        );

        let q = bind_values(sqlx::query_as::<_, AnalysisRecord>(&query), &binds);
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count records matching the filter (for pagination metadata).
    pub async fn count(pool: &PgPool, filter: &AnalysisFilter) -> Result<i64, sqlx::Error> {
        let (where_clause, binds, _) = build_filter(filter);
        let query = format!("SELECT COUNT(*)::BIGINT FROM analysis_records {where_clause}");
        let q = bind_scalar(sqlx::query_scalar::<_, i64>(&query), &binds);
        q.fetch_one(pool).await
    }

    /// Export records matching the filter, oldest first, hard-capped.
    pub async fn export(
        pool: &PgPool,
        filter: &AnalysisFilter,
        row_cap: i64,
    ) -> Result<Vec<AnalysisRecord>, sqlx::Error> {
        let cap = row_cap.clamp(1, EXPORT_ROW_CAP);
        let (where_clause, binds, next_idx) = build_filter(filter);
        let query = format!(
            "SELECT {COLUMNS} FROM analysis_records {where_clause} \
             ORDER BY created_at ASC LIMIT ${next_idx}"
        );
        let q = bind_values(sqlx::query_as::<_, AnalysisRecord>(&query), &binds);
        q.bind(cap).fetch_all(pool).await
    }

    /// Delete records created before the cutoff. Returns the rows removed.
    pub async fn prune_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM analysis_records WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// All-time aggregates.
    pub async fn stats(pool: &PgPool) -> Result<StatsData, sqlx::Error> {
        let (total, ai_detected, average_confidence): (i64, i64, f64) = sqlx::query_as(
            "SELECT COUNT(*)::BIGINT, \
                    (COUNT(*) FILTER (WHERE is_ai_generated))::BIGINT, \
                    COALESCE(AVG(confidence), 0)::DOUBLE PRECISION \
             FROM analysis_records",
        )
        .fetch_one(pool)
        .await?;

        let by_type = sqlx::query_as::<_, CountByKey>(
            "SELECT content_type AS key, COUNT(*)::BIGINT AS count \
             FROM analysis_records GROUP BY content_type ORDER BY count DESC, key ASC",
        )
        .fetch_all(pool)
        .await?;

        Ok(StatsData {
            total_analyses: total,
            ai_detected_count: ai_detected,
            human_detected_count: total - ai_detected,
            average_confidence,
            by_type,
        })
    }

    /// Windowed dashboard aggregates with a zero-filled daily timeline.
    ///
    /// The window covers `window_days` calendar days (UTC) ending today, so
    /// every aggregate scans only rows inside the window.
    pub async fn dashboard(pool: &PgPool, window_days: i64) -> Result<DashboardData, sqlx::Error> {
        let window_days = window_days.clamp(1, 90);
        let today = Utc::now().date_naive();
        let start_day = today - Duration::days(window_days - 1);
        let cutoff = start_day
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always valid")
            .and_utc();

        let total_all_time: i64 =
            sqlx::query_scalar("SELECT COUNT(*)::BIGINT FROM analysis_records")
                .fetch_one(pool)
                .await?;

        let (total_window, ai_window, average_confidence): (i64, i64, f64) = sqlx::query_as(
            "SELECT COUNT(*)::BIGINT, \
                    (COUNT(*) FILTER (WHERE is_ai_generated))::BIGINT, \
                    COALESCE(AVG(confidence), 0)::DOUBLE PRECISION \
             FROM analysis_records WHERE created_at >= $1",
        )
        .bind(cutoff)
        .fetch_one(pool)
        .await?;

        let by_type_window = sqlx::query_as::<_, CountByKey>(
            "SELECT content_type AS key, COUNT(*)::BIGINT AS count \
             FROM analysis_records WHERE created_at >= $1 \
             GROUP BY content_type ORDER BY count DESC, key ASC",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await?;

        let by_source_window = sqlx::query_as::<_, CountByKey>(
            "SELECT source AS key, COUNT(*)::BIGINT AS count \
             FROM analysis_records WHERE created_at >= $1 \
             GROUP BY source ORDER BY count DESC, key ASC",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await?;

        let top_models_window = sqlx::query_as::<_, ModelCount>(
            "SELECT model_prediction AS model, COUNT(*)::BIGINT AS count \
             FROM analysis_records \
             WHERE created_at >= $1 AND model_prediction IS NOT NULL \
             GROUP BY model_prediction ORDER BY count DESC, model ASC LIMIT 5",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await?;

        let day_rows: Vec<(NaiveDate, i64, i64)> = sqlx::query_as(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, \
                    COUNT(*)::BIGINT, \
                    (COUNT(*) FILTER (WHERE is_ai_generated))::BIGINT \
             FROM analysis_records WHERE created_at >= $1 \
             GROUP BY day ORDER BY day ASC",
        )
        .bind(cutoff)
        .fetch_all(pool)
        .await?;

        let timeline = zero_fill_timeline(start_day, window_days, &day_rows);
        let alerts_window = alerts::evaluate(&timeline);

        let summary = DashboardSummary {
            total_analyses_all_time: total_all_time,
            total_analyses_window: total_window,
            ai_detected_window: ai_window,
            human_detected_window: total_window - ai_window,
            ai_rate_window: ai_window as f64 / total_window.max(1) as f64,
            average_confidence_window: average_confidence,
        };

        Ok(DashboardData {
            window_days,
            summary,
            by_type_window,
            by_source_window,
            top_models_window,
            timeline,
            alerts_window,
        })
    }
}

/// Expand sparse per-day rows into one entry per calendar day.
fn zero_fill_timeline(
    start_day: NaiveDate,
    window_days: i64,
    day_rows: &[(NaiveDate, i64, i64)],
) -> Vec<TimelineDay> {
    (0..window_days)
        .map(|i| {
            let date = start_day + Duration::days(i);
            let (total, ai) = day_rows
                .iter()
                .find(|(day, _, _)| *day == date)
                .map(|(_, total, ai)| (*total, *ai))
                .unwrap_or((0, 0));
            TimelineDay {
                date,
                total,
                ai_detected: ai,
                human_detected: (total - ai).max(0),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dynamic filter building
// ---------------------------------------------------------------------------

enum BindValue {
    Text(String),
    Timestamp(Timestamp),
}

/// Build a WHERE clause and binds from the filter.
///
/// Returns `(where_clause, binds, next_bind_index)`.
fn build_filter(filter: &AnalysisFilter) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<BindValue> = Vec::new();
    let mut idx = 1u32;

    if let Some(ref content_type) = filter.content_type {
        conditions.push(format!("content_type = ${idx}"));
        idx += 1;
        binds.push(BindValue::Text(content_type.clone()));
    }
    if let Some(ref source) = filter.source {
        conditions.push(format!("source = ${idx}"));
        idx += 1;
        binds.push(BindValue::Text(source.clone()));
    }
    if let Some(since) = filter.since {
        conditions.push(format!("created_at >= ${idx}"));
        idx += 1;
        binds.push(BindValue::Timestamp(since));
    }
    if let Some(until) = filter.until {
        conditions.push(format!("created_at <= ${idx}"));
        idx += 1;
        binds.push(BindValue::Timestamp(until));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (where_clause, binds, idx)
}

fn bind_values<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    binds: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for value in binds {
        match value {
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}

fn bind_scalar<'q>(
    mut q: sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    binds: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
    for value in binds {
        match value {
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}
