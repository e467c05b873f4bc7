//! Queue-file persistence for webhook delivery.
//!
//! The queue is a single JSON array rewritten atomically (temp file +
//! rename) on every change, which makes recovery after a crash trivial: the
//! file is always a complete snapshot. The dead-letter log is append-only
//! JSONL and is never rewritten.

use std::path::{Path, PathBuf};

use chrono::Utc;
use provtrack_core::types::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// One pending delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookItem {
    /// Monotonically-increasing sequence id; consumers see the same value
    /// on every redelivery of the same event.
    pub event_seq: u64,
    pub event_type: String,
    pub url: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub created_at: Timestamp,
    pub next_attempt_at: Timestamp,
    pub first_failed_at: Option<Timestamp>,
    pub last_error: Option<String>,
}

/// One exhausted delivery, recorded forever.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub event_seq: u64,
    pub event_type: String,
    pub url: String,
    pub attempts: u32,
    pub last_error: String,
    pub payload_digest: String,
    pub first_failed_at: Option<Timestamp>,
    pub dead_lettered_at: Timestamp,
}

/// File-backed queue with an in-process sequence counter.
pub struct WebhookQueue {
    queue_path: PathBuf,
    dead_letter_path: PathBuf,
    /// Guards load-modify-save cycles; holds the next sequence id.
    next_seq: Mutex<u64>,
}

impl WebhookQueue {
    /// Open the queue, seeding the sequence counter past anything already
    /// on disk.
    pub async fn open(queue_path: PathBuf, dead_letter_path: PathBuf) -> Self {
        let existing = load_items(&queue_path).await;
        let next_seq = existing.iter().map(|i| i.event_seq).max().unwrap_or(0) + 1;
        Self {
            queue_path,
            dead_letter_path,
            next_seq: Mutex::new(next_seq),
        }
    }

    /// Current queue snapshot, oldest first.
    pub async fn load(&self) -> Vec<WebhookItem> {
        load_items(&self.queue_path).await
    }

    /// Append one item, assigning the next sequence id.
    pub async fn enqueue(
        &self,
        event_type: &str,
        url: &str,
        payload: serde_json::Value,
    ) -> std::io::Result<WebhookItem> {
        let mut seq = self.next_seq.lock().await;
        let now = Utc::now();
        let item = WebhookItem {
            event_seq: *seq,
            event_type: event_type.to_string(),
            url: url.to_string(),
            payload,
            attempts: 0,
            created_at: now,
            next_attempt_at: now,
            first_failed_at: None,
            last_error: None,
        };
        let mut items = load_items(&self.queue_path).await;
        items.push(item.clone());
        write_snapshot(&self.queue_path, &items).await?;
        *seq += 1;
        Ok(item)
    }

    /// Claim every queued item for a drain cycle, clearing the snapshot.
    ///
    /// Items enqueued while the drain runs land in a fresh snapshot and
    /// are merged back in by [`restore`](Self::restore).
    pub async fn take_all(&self) -> Vec<WebhookItem> {
        let _guard = self.next_seq.lock().await;
        let items = load_items(&self.queue_path).await;
        if !items.is_empty() {
            if let Err(e) = write_snapshot(&self.queue_path, &[]).await {
                tracing::error!(error = %e, "Failed to clear webhook queue snapshot");
            }
        }
        items
    }

    /// Write back the still-pending items, keeping anything enqueued since
    /// [`take_all`](Self::take_all) after them.
    pub async fn restore(&self, mut items: Vec<WebhookItem>) -> std::io::Result<()> {
        let _guard = self.next_seq.lock().await;
        let mut enqueued_meanwhile = load_items(&self.queue_path).await;
        items.append(&mut enqueued_meanwhile);
        write_snapshot(&self.queue_path, &items).await
    }

    /// Append one entry to the dead-letter log.
    pub async fn append_dead_letter(&self, entry: &DeadLetterEntry) -> std::io::Result<()> {
        if let Some(parent) = self.dead_letter_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_vec(entry).expect("dead letter entries always serialize");
        line.push(b'\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.dead_letter_path)
            .await?;
        file.write_all(&line).await
    }

    /// Read the full dead-letter log (operator/test helper).
    pub async fn read_dead_letters(&self) -> Vec<DeadLetterEntry> {
        let Ok(content) = tokio::fs::read_to_string(&self.dead_letter_path).await else {
            return Vec::new();
        };
        content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

/// Atomic snapshot write: temp file + rename.
async fn write_snapshot(path: &Path, items: &[WebhookItem]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("tmp");
    let body = serde_json::to_vec_pretty(items).expect("queue items always serialize");
    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(&body).await?;
    file.sync_all().await?;
    tokio::fs::rename(&tmp_path, path).await
}

/// Tolerant snapshot read: a missing or corrupt file is an empty queue.
async fn load_items(path: &Path) -> Vec<WebhookItem> {
    let Ok(content) = tokio::fs::read(path).await else {
        return Vec::new();
    };
    match serde_json::from_slice::<Vec<WebhookItem>>(&content) {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Discarding unreadable webhook queue");
            Vec::new()
        }
    }
}
