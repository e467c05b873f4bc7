//! Repository for the `audit_events` table.

use provtrack_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::audit_event::{AuditEventFilter, AuditEventRow, CreateAuditEvent};

const COLUMNS: &str = "\
    id, event_type, severity, source, actor_id, request_id, payload, created_at";

/// Insert and query operations for audit events.
pub struct AuditEventRepo;

impl AuditEventRepo {
    /// Append one event, returning the generated id.
    pub async fn insert(pool: &PgPool, event: &CreateAuditEvent) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO audit_events \
             (event_type, severity, source, actor_id, request_id, payload) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(&event.event_type)
        .bind(&event.severity)
        .bind(&event.source)
        .bind(&event.actor_id)
        .bind(&event.request_id)
        .bind(&event.payload)
        .fetch_one(pool)
        .await
    }

    /// Filtered, paginated query, newest first.
    pub async fn query(
        pool: &PgPool,
        filter: &AuditEventFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AuditEventRow>, sqlx::Error> {
        let limit = limit.clamp(1, 500);
        let offset = offset.max(0);
        let (where_clause, binds, next_idx) = build_filter(filter);

        let query = format!(
            "SELECT {COLUMNS} FROM audit_events {where_clause} \
             ORDER BY created_at DESC, id DESC \
             LIMIT ${next_idx} OFFSET ${}",
            next_idx + 1
        );

        let mut q = sqlx::query_as::<_, AuditEventRow>(&query);
        for value in &binds {
            match value {
                BindValue::Text(v) => q = q.bind(v.as_str()),
                BindValue::Timestamp(v) => q = q.bind(*v),
            }
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count events matching the filter.
    pub async fn count(pool: &PgPool, filter: &AuditEventFilter) -> Result<i64, sqlx::Error> {
        let (where_clause, binds, _) = build_filter(filter);
        let query = format!("SELECT COUNT(*)::BIGINT FROM audit_events {where_clause}");
        let mut q = sqlx::query_scalar::<_, i64>(&query);
        for value in &binds {
            match value {
                BindValue::Text(v) => q = q.bind(v.as_str()),
                BindValue::Timestamp(v) => q = q.bind(*v),
            }
        }
        q.fetch_one(pool).await
    }

    /// Delete events created before the cutoff. Returns the rows removed.
    pub async fn prune_older_than(pool: &PgPool, cutoff: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM audit_events WHERE created_at < $1")
            .bind(cutoff)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

enum BindValue {
    Text(String),
    Timestamp(Timestamp),
}

fn build_filter(filter: &AuditEventFilter) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut binds: Vec<BindValue> = Vec::new();
    let mut idx = 1u32;

    if let Some(ref event_type) = filter.event_type {
        conditions.push(format!("event_type = ${idx}"));
        idx += 1;
        binds.push(BindValue::Text(event_type.clone()));
    }
    if let Some(ref severity) = filter.severity {
        conditions.push(format!("severity = ${idx}"));
        idx += 1;
        binds.push(BindValue::Text(severity.clone()));
    }
    if let Some(ref actor_id) = filter.actor_id {
        conditions.push(format!("actor_id = ${idx}"));
        idx += 1;
        binds.push(BindValue::Text(actor_id.clone()));
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
