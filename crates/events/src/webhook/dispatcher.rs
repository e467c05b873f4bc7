//! The webhook drain loop.
//!
//! Runs as its own cooperative task, independent of the scheduler tick.
//! Each cycle loads the queue snapshot, attempts every due item once,
//! rewrites the snapshot, and sleeps. Delivery is at-least-once: an item
//! leaves the queue only on a 2xx response or after `max_attempts`
//! failures, in which case it moves to the dead-letter log.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use provtrack_core::hashing::sha256_hex;
use provtrack_core::types::Severity;
use rand::Rng;
use serde_json::json;
use sha2::Sha256;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditEvent, AuditHub};

use super::queue::{DeadLetterEntry, WebhookItem, WebhookQueue};

/// Webhook delivery configuration.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub urls: Vec<String>,
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub request_timeout: Duration,
    pub drain_interval: Duration,
    pub secret: Option<String>,
    pub queue_file: PathBuf,
    pub dead_letter_file: PathBuf,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            max_attempts: 5,
            base_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(300),
            request_timeout: Duration::from_secs(10),
            drain_interval: Duration::from_secs(2),
            secret: None,
            queue_file: PathBuf::from("data/webhook_queue.json"),
            dead_letter_file: PathBuf::from("data/webhook_dead_letter.jsonl"),
        }
    }
}

/// Counters for one drain cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct DrainStats {
    pub processed: usize,
    pub delivered: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    pub pending: usize,
}

/// Delivers queued events to configured URLs with backoff and dead-letter
/// semantics.
pub struct WebhookDispatcher {
    config: WebhookConfig,
    client: reqwest::Client,
    queue: WebhookQueue,
    audit: Arc<AuditHub>,
}

impl WebhookDispatcher {
    pub async fn new(config: WebhookConfig, audit: Arc<AuditHub>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("failed to build webhook HTTP client");
        let queue =
            WebhookQueue::open(config.queue_file.clone(), config.dead_letter_file.clone()).await;
        Self {
            config,
            client,
            queue,
            audit,
        }
    }

    /// Enqueue one event for every configured URL. A no-op when no URLs
    /// are configured.
    pub async fn enqueue_event(&self, event_type: &str, payload: serde_json::Value) {
        for url in &self.config.urls {
            match self.queue.enqueue(event_type, url, payload.clone()).await {
                Ok(item) => {
                    tracing::debug!(event_seq = item.event_seq, url, event_type, "Webhook enqueued");
                }
                Err(e) => {
                    tracing::error!(url, event_type, error = %e, "Failed to enqueue webhook");
                }
            }
        }
    }

    /// Number of items currently queued.
    pub async fn pending(&self) -> usize {
        self.queue.load().await.len()
    }

    /// Dead-letter log contents (operator endpoint / tests).
    pub async fn dead_letters(&self) -> Vec<DeadLetterEntry> {
        self.queue.read_dead_letters().await
    }

    /// Run the drain loop until cancelled. Only one drain task may run per
    /// process; the queue file is not safe for concurrent rewriting.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.drain_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Webhook dispatcher cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let stats = self.drain_with_cancel(Some(&cancel)).await;
                    if stats.processed > 0 {
                        tracing::info!(
                            processed = stats.processed,
                            delivered = stats.delivered,
                            dead_lettered = stats.dead_lettered,
                            pending = stats.pending,
                            "Webhook drain cycle complete"
                        );
                    }
                }
            }
        }
    }

    /// Process every due item once and rewrite the snapshot.
    pub async fn drain(&self) -> DrainStats {
        self.drain_with_cancel(None).await
    }

    async fn drain_with_cancel(&self, cancel: Option<&CancellationToken>) -> DrainStats {
        let items = self.queue.take_all().await;
        if items.is_empty() {
            return DrainStats::default();
        }

        let mut stats = DrainStats::default();
        let mut pending: Vec<WebhookItem> = Vec::with_capacity(items.len());
        let mut remaining = items.into_iter();

        for mut item in remaining.by_ref() {
            let now = Utc::now();
            if item.next_attempt_at > now {
                pending.push(item);
                continue;
            }

            stats.processed += 1;
            let body = serde_json::to_vec(&json!({
                "event_seq": item.event_seq,
                "event_type": item.event_type,
                "payload": item.payload,
            }))
            .expect("webhook bodies always serialize");

            match self.deliver_once(&item.url, &body).await {
                Ok(status) => {
                    stats.delivered += 1;
                    self.audit.emit(
                        AuditEvent::new("webhook.delivered")
                            .with_source("webhook")
                            .with_payload(json!({
                                "url": item.url,
                                "event_seq": item.event_seq,
                                "event_type": item.event_type,
                                "status_code": status,
                                "attempts": item.attempts + 1,
                            })),
                    );
                }
                Err(error) => {
                    item.attempts += 1;
                    item.first_failed_at.get_or_insert(now);
                    item.last_error = Some(error.clone());

                    if item.attempts >= self.config.max_attempts {
                        stats.dead_lettered += 1;
                        self.dead_letter(&item, &body, error).await;
                    } else {
                        stats.retried += 1;
                        item.next_attempt_at =
                            now + chrono::Duration::from_std(self.backoff(item.attempts))
                                .unwrap_or_else(|_| chrono::Duration::seconds(1));
                        pending.push(item);
                    }
                }
            }

            // On shutdown, finish the current item and persist the rest
            // untouched.
            if cancel.is_some_and(|c| c.is_cancelled()) {
                break;
            }
        }
        pending.extend(remaining);

        stats.pending = pending.len();
        if let Err(e) = self.queue.restore(pending).await {
            tracing::error!(error = %e, "Failed to rewrite webhook queue snapshot");
        }
        stats
    }

    /// One HTTP POST. Success is strictly 2xx.
    async fn deliver_once(&self, url: &str, body: &[u8]) -> Result<u16, String> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_vec());
        if let Some(signature) = self.signature(body) {
            request = request.header("X-Webhook-Signature", signature);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    Ok(status.as_u16())
                } else {
                    Err(format!("HTTP {}", status.as_u16()))
                }
            }
            Err(e) => Err(format!("transport error: {e}")),
        }
    }

    async fn dead_letter(&self, item: &WebhookItem, body: &[u8], error: String) {
        let entry = DeadLetterEntry {
            event_seq: item.event_seq,
            event_type: item.event_type.clone(),
            url: item.url.clone(),
            attempts: item.attempts,
            last_error: error,
            payload_digest: sha256_hex(body),
            first_failed_at: item.first_failed_at,
            dead_lettered_at: Utc::now(),
        };
        if let Err(e) = self.queue.append_dead_letter(&entry).await {
            tracing::error!(error = %e, event_seq = item.event_seq, "Failed to write dead letter");
        }
        self.audit.emit(
            AuditEvent::new("webhook.dead_lettered")
                .with_source("webhook")
                .with_severity(Severity::Warning)
                .with_payload(json!({
                    "url": item.url,
                    "event_seq": item.event_seq,
                    "event_type": item.event_type,
                    "attempts": item.attempts,
                    "payload_digest": entry.payload_digest,
                    "last_error": entry.last_error,
                })),
        );
    }

    /// Exponential backoff with ±20 % jitter, capped at `max_backoff`.
    fn backoff(&self, attempts: u32) -> Duration {
        let exact = backoff_duration(attempts, self.config.base_backoff, self.config.max_backoff);
        let jitter = rand::rng().random_range(0.8..=1.2);
        exact.mul_f64(jitter)
    }

    /// HMAC-SHA256 body signature when a secret is configured.
    fn signature(&self, body: &[u8]) -> Option<String> {
        let secret = self.config.secret.as_deref()?;
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(body);
        let digest = mac.finalize().into_bytes();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        Some(format!("sha256={hex}"))
    }
}

/// `base * 2^(attempts - 1)`, capped. Pure so the growth curve is testable
/// without the jitter.
fn backoff_duration(attempts: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempts.saturating_sub(1).min(30));
    base.saturating_mul(factor).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::post;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn backoff_doubles_then_caps() {
        let base = Duration::from_secs(2);
        let max = Duration::from_secs(300);
        assert_eq!(backoff_duration(1, base, max), Duration::from_secs(2));
        assert_eq!(backoff_duration(2, base, max), Duration::from_secs(4));
        assert_eq!(backoff_duration(3, base, max), Duration::from_secs(8));
        assert_eq!(backoff_duration(9, base, max), Duration::from_secs(300));
        assert_eq!(backoff_duration(40, base, max), Duration::from_secs(300));
    }

    async fn spawn_sink(status: u16, hits: Arc<AtomicUsize>) -> String {
        let app = Router::new().route(
            "/hook",
            post(move || {
                let hits = Arc::clone(&hits);
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    axum::http::StatusCode::from_u16(status).unwrap()
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/hook")
    }

    async fn dispatcher_for(url: String, max_attempts: u32) -> WebhookDispatcher {
        let dir = tempfile::tempdir().unwrap();
        let config = WebhookConfig {
            urls: vec![url],
            max_attempts,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            request_timeout: Duration::from_secs(2),
            drain_interval: Duration::from_millis(10),
            secret: Some("testing-secret".to_string()),
            queue_file: dir.path().join("queue.json"),
            dead_letter_file: dir.path().join("dlq.jsonl"),
        };
        // Keep the tempdir alive for the duration of the test process.
        std::mem::forget(dir);
        WebhookDispatcher::new(config, Arc::new(AuditHub::new(true, 100))).await
    }

    #[tokio::test]
    async fn successful_delivery_drops_the_item() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_sink(200, Arc::clone(&hits)).await;
        let dispatcher = dispatcher_for(url, 3).await;

        dispatcher
            .enqueue_event("detection.completed", json!({"analysis_id": "a1"}))
            .await;
        let stats = dispatcher.drain().await;

        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(dispatcher.dead_letters().await.is_empty());

        let delivered = dispatcher.audit.ring().tail(10, &Default::default());
        assert!(delivered.iter().any(|e| e.event_type == "webhook.delivered"));
    }

    #[tokio::test]
    async fn permanent_failure_dead_letters_after_max_attempts() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_sink(500, Arc::clone(&hits)).await;
        let dispatcher = dispatcher_for(url, 3).await;

        dispatcher
            .enqueue_event("detection.completed", json!({"analysis_id": "a2"}))
            .await;

        // Zero backoff: three drains, three attempts.
        for _ in 0..3 {
            dispatcher.drain().await;
        }

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(dispatcher.pending().await, 0);

        let dead = dispatcher.dead_letters().await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 3);
        assert_eq!(dead[0].payload_digest.len(), 64);

        let events = dispatcher.audit.ring().tail(10, &Default::default());
        assert!(events
            .iter()
            .any(|e| e.event_type == "webhook.dead_lettered"));
    }

    #[tokio::test]
    async fn unreachable_host_retries_then_dead_letters() {
        // Nothing listens on this port.
        let dispatcher = dispatcher_for("http://127.0.0.1:1/hook".to_string(), 2).await;
        dispatcher.enqueue_event("e", json!({})).await;

        dispatcher.drain().await;
        assert_eq!(dispatcher.pending().await, 1);
        dispatcher.drain().await;
        assert_eq!(dispatcher.pending().await, 0);
        assert_eq!(dispatcher.dead_letters().await.len(), 1);
    }

    #[tokio::test]
    async fn no_configured_urls_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let config = WebhookConfig {
            urls: Vec::new(),
            queue_file: dir.path().join("queue.json"),
            dead_letter_file: dir.path().join("dlq.jsonl"),
            ..Default::default()
        };
        let dispatcher = WebhookDispatcher::new(config, Arc::new(AuditHub::new(true, 10))).await;
        dispatcher.enqueue_event("e", json!({})).await;
        assert_eq!(dispatcher.pending().await, 0);
    }
}
