//! Audit event entity and query DTOs.

use provtrack_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted audit event. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditEventRow {
    pub id: DbId,
    pub event_type: String,
    pub severity: String,
    pub source: String,
    pub actor_id: Option<String>,
    pub request_id: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}

/// DTO for inserting a new audit event.
#[derive(Debug, Clone)]
pub struct CreateAuditEvent {
    pub event_type: String,
    pub severity: String,
    pub source: String,
    pub actor_id: Option<String>,
    pub request_id: Option<String>,
    pub payload: serde_json::Value,
}

/// Filter parameters for audit queries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditEventFilter {
    pub event_type: Option<String>,
    pub severity: Option<String>,
    pub actor_id: Option<String>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
}

/// Paginated audit query result.
#[derive(Debug, Serialize)]
pub struct AuditEventPage {
    pub items: Vec<AuditEventRow>,
    pub total: i64,
}
