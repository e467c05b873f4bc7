//! Shared application state for Axum handlers.

use std::sync::Arc;

use provtrack_consensus::ConsensusEngine;
use provtrack_db::DbPool;
use provtrack_events::{AuditHub, IntelScheduler, WebhookDispatcher};

use crate::config::AppConfig;
use crate::limiter::GuardHandle;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable: every field is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Server configuration.
    pub config: Arc<AppConfig>,
    /// Consensus engine (internal detector + external providers).
    pub engine: Arc<ConsensusEngine>,
    /// Audit pipeline entry point.
    pub audit: Arc<AuditHub>,
    /// Durable webhook dispatcher.
    pub webhooks: Arc<WebhookDispatcher>,
    /// Recurring intel scheduler.
    pub scheduler: Arc<IntelScheduler>,
    /// Rate/spend guard backend.
    pub guard: Arc<GuardHandle>,
    /// Outbound HTTP client for URL detection.
    pub http_client: reqwest::Client,
}
