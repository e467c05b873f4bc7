//! Audit event pipeline: non-blocking emission, bounded ring, durable
//! persistence.
//!
//! [`AuditHub::emit`] never touches the database on the caller's path: it
//! records the event in the in-memory ring and broadcasts it. A single
//! [`AuditPersistence`] task subscribes and writes rows, logging (never
//! propagating) failures, so a broken database cannot fail the operation
//! that emitted the event.

use std::sync::Arc;

use chrono::Utc;
use provtrack_core::types::{Severity, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use provtrack_db::models::audit_event::CreateAuditEvent;
use provtrack_db::repositories::AuditEventRepo;
use provtrack_db::DbPool;

use crate::ring::AuditRing;

/// Broadcast buffer between emitters and the persistence task.
const CHANNEL_CAPACITY: usize = 4096;

/// One structured audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Dot-separated event name, e.g. `"detection.completed"`.
    pub event_type: String,
    pub severity: Severity,
    /// Emitting component: `"api"`, `"scheduler"`, or `"webhook"`.
    pub source: String,
    pub actor_id: Option<String>,
    pub request_id: Option<String>,
    pub payload: serde_json::Value,
    pub created_at: Timestamp,
}

impl AuditEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            severity: Severity::Info,
            source: "api".to_string(),
            actor_id: None,
            request_id: None,
            payload: serde_json::Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_actor(mut self, actor_id: Option<String>) -> Self {
        self.actor_id = actor_id;
        self
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Central emission point shared by every component.
pub struct AuditHub {
    enabled: bool,
    sender: broadcast::Sender<AuditEvent>,
    ring: Arc<AuditRing>,
}

impl AuditHub {
    pub fn new(enabled: bool, ring_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            enabled,
            sender,
            ring: Arc::new(AuditRing::new(ring_capacity)),
        }
    }

    /// Emit one event. Non-blocking; silently a no-op when auditing is
    /// disabled or when nothing subscribes to the persistence side.
    pub fn emit(&self, event: AuditEvent) {
        if !self.enabled {
            return;
        }
        self.ring.record(event.clone());
        // A send error only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to the persistence stream.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.sender.subscribe()
    }

    /// The bounded in-memory tail.
    pub fn ring(&self) -> &AuditRing {
        &self.ring
    }
}

/// Background service persisting audit events to the database.
pub struct AuditPersistence;

impl AuditPersistence {
    /// Run the persistence loop until the hub is dropped.
    ///
    /// Lagged receivers skip events (the ring still has them); write
    /// failures are logged and dropped per the audit contract.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<AuditEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let row = CreateAuditEvent {
                        event_type: event.event_type.clone(),
                        severity: event.severity.as_str().to_string(),
                        source: event.source.clone(),
                        actor_id: event.actor_id.clone(),
                        request_id: event.request_id.clone(),
                        payload: event.payload.clone(),
                    };
                    if let Err(e) = AuditEventRepo::insert(&pool, &row).await {
                        tracing::warn!(
                            error = %e,
                            event_type = %event.event_type,
                            "Failed to persist audit event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Audit persistence lagged behind emitters");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Audit hub closed, persistence shutting down");
                    break;
                }
            }
        }
    }
}
