//! Fixed-window rate limiting and daily spend accounting.
//!
//! Every metered call is checked twice: against its bucket's fixed-window
//! counter, then against the client's daily point budget. The window counter
//! is incremented before the spend check and is deliberately not rolled back
//! when the spend check rejects; the ledger is the authoritative gate.
//!
//! This is the in-process backend (single-instance deployments). The API
//! crate provides a Redis-backed variant with identical semantics for
//! multi-worker deployments.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Duration;

use crate::types::{ContentType, Timestamp};

/// Logical rate-limit buckets. Endpoint paths map onto these in the API
/// layer; the guard itself never sees a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Text,
    Media,
    Batch,
    Intel,
    Default,
}

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Text => "text",
            Bucket::Media => "media",
            Bucket::Batch => "batch",
            Bucket::Intel => "intel",
            Bucket::Default => "default",
        }
    }
}

/// Per-bucket window configuration.
#[derive(Debug, Clone, Copy)]
pub struct BucketLimit {
    pub max_requests: u32,
    pub window_seconds: u64,
}

/// Full guard configuration: one limit per bucket plus the daily cap.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub text: BucketLimit,
    pub media: BucketLimit,
    pub batch: BucketLimit,
    pub intel: BucketLimit,
    pub default: BucketLimit,
    pub daily_cap_points: i64,
}

impl GuardConfig {
    pub fn limit_for(&self, bucket: Bucket) -> BucketLimit {
        match bucket {
            Bucket::Text => self.text,
            Bucket::Media => self.media,
            Bucket::Batch => self.batch,
            Bucket::Intel => self.intel,
            Bucket::Default => self.default,
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        let window = |max_requests| BucketLimit {
            max_requests,
            window_seconds: 60,
        };
        Self {
            text: window(100),
            media: window(40),
            batch: window(20),
            intel: window(20),
            default: window(100),
            daily_cap_points: 1000,
        }
    }
}

/// Spend points debited per operation.
pub fn detection_cost(content_type: ContentType) -> u32 {
    match content_type {
        ContentType::Text => 1,
        ContentType::Image => 3,
        ContentType::Audio => 4,
        ContentType::Video => 6,
    }
}

pub const BATCH_COST: u32 = 5;
pub const INTEL_COST: u32 = 8;

/// Why a call was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reject {
    RateLimited { retry_after_seconds: u64 },
    SpendCapExceeded { retry_after_seconds: u64 },
}

/// Usage snapshot returned on accept, for logging.
#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub window_hits: u32,
    pub day_points: i64,
}

#[derive(Default)]
struct GuardState {
    /// `(client, bucket)` -> counter for the current window only.
    windows: HashMap<(String, Bucket), (u64, u32)>,
    /// `client` -> points for the current UTC day only.
    ledger: HashMap<String, (String, i64)>,
}

/// In-process fixed-window limiter with a per-day spend ledger.
pub struct RateGuard {
    config: GuardConfig,
    state: Mutex<GuardState>,
}

impl RateGuard {
    pub fn new(config: GuardConfig) -> Self {
        Self {
            config,
            state: Mutex::new(GuardState::default()),
        }
    }

    /// Increment-and-test the bucket window, then debit the spend ledger.
    pub fn authorize(
        &self,
        now: Timestamp,
        client_id: &str,
        bucket: Bucket,
        cost_points: u32,
    ) -> Result<Usage, Reject> {
        let limit = self.config.limit_for(bucket);
        let window_seconds = limit.window_seconds.max(1);
        let epoch = now.timestamp().max(0) as u64;
        let window_start = epoch - (epoch % window_seconds);

        let mut state = self.state.lock().expect("rate guard mutex poisoned");

        let entry = state
            .windows
            .entry((client_id.to_string(), bucket))
            .or_insert((window_start, 0));
        if entry.0 != window_start {
            *entry = (window_start, 0);
        }
        if entry.1 >= limit.max_requests {
            let retry_after_seconds = (window_start + window_seconds).saturating_sub(epoch).max(1);
            return Err(Reject::RateLimited {
                retry_after_seconds,
            });
        }
        entry.1 += 1;
        let window_hits = entry.1;

        let day_key = now.date_naive().to_string();
        let ledger = state
            .ledger
            .entry(client_id.to_string())
            .or_insert_with(|| (day_key.clone(), 0));
        if ledger.0 != day_key {
            *ledger = (day_key, 0);
        }
        let next_points = ledger.1 + i64::from(cost_points);
        if next_points > self.config.daily_cap_points {
            // The window increment above stands; only the debit rolls back.
            return Err(Reject::SpendCapExceeded {
                retry_after_seconds: seconds_to_next_day(now),
            });
        }
        ledger.1 = next_points;

        Ok(Usage {
            window_hits,
            day_points: next_points,
        })
    }

    /// Admin reset: clears all counters and the ledger for one client.
    pub fn reset(&self, client_id: &str) {
        let mut state = self.state.lock().expect("rate guard mutex poisoned");
        state.windows.retain(|(client, _), _| client != client_id);
        state.ledger.remove(client_id);
    }
}

/// Seconds until the next UTC day boundary, for `Retry-After` on spend caps.
pub fn seconds_to_next_day(now: Timestamp) -> u64 {
    let tomorrow = (now.date_naive() + Duration::days(1))
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    (tomorrow - now).num_seconds().max(1) as u64
}

/// Current UTC day key, shared with the Redis backend.
pub fn day_key(now: Timestamp) -> String {
    now.date_naive().to_string()
}

/// Window start for `(now, window_seconds)`, shared with the Redis backend.
pub fn window_start(now: Timestamp, window_seconds: u64) -> u64 {
    let epoch = now.timestamp().max(0) as u64;
    let window_seconds = window_seconds.max(1);
    epoch - (epoch % window_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn guard(max_requests: u32, window_seconds: u64, daily_cap: i64) -> RateGuard {
        let limit = BucketLimit {
            max_requests,
            window_seconds,
        };
        RateGuard::new(GuardConfig {
            text: limit,
            media: limit,
            batch: limit,
            intel: limit,
            default: limit,
            daily_cap_points: daily_cap,
        })
    }

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn n_accepts_then_reject_with_bounded_retry_after() {
        let guard = guard(3, 60, 1000);
        let now = at(1_700_000_005);
        for _ in 0..3 {
            guard.authorize(now, "client-a", Bucket::Text, 1).unwrap();
        }
        let err = guard
            .authorize(now, "client-a", Bucket::Text, 1)
            .unwrap_err();
        match err {
            Reject::RateLimited {
                retry_after_seconds,
            } => assert!(retry_after_seconds >= 1 && retry_after_seconds <= 60),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn window_resets_at_the_boundary() {
        let guard = guard(1, 60, 1000);
        guard
            .authorize(at(1_700_000_000), "c", Bucket::Text, 1)
            .unwrap();
        assert!(guard
            .authorize(at(1_700_000_030), "c", Bucket::Text, 1)
            .is_err());
        // 1_700_000_040 is the next multiple of 60.
        guard
            .authorize(at(1_700_000_041), "c", Bucket::Text, 1)
            .unwrap();
    }

    #[test]
    fn buckets_are_independent() {
        let guard = guard(1, 60, 1000);
        let now = at(1_700_000_005);
        guard.authorize(now, "c", Bucket::Text, 1).unwrap();
        guard.authorize(now, "c", Bucket::Media, 3).unwrap();
        assert!(guard.authorize(now, "c", Bucket::Text, 1).is_err());
    }

    #[test]
    fn spend_cap_matches_scenario_costs() {
        // 3 text (1pt) + 1 image (3pt) succeed, then video (6pt) breaches 10.
        let guard = guard(100, 60, 10);
        let now = at(1_700_000_005);
        for _ in 0..3 {
            guard.authorize(now, "c", Bucket::Text, 1).unwrap();
        }
        guard.authorize(now, "c", Bucket::Media, 3).unwrap();
        let err = guard.authorize(now, "c", Bucket::Media, 6).unwrap_err();
        assert!(matches!(err, Reject::SpendCapExceeded { .. }));
        // A 4pt call still fits under the cap afterwards: the failed debit
        // rolled back.
        guard.authorize(now, "c", Bucket::Media, 4).unwrap();
    }

    #[test]
    fn spend_cap_retry_after_points_at_next_day() {
        let guard = guard(100, 60, 1);
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 23, 0, 0).unwrap();
        guard.authorize(now, "c", Bucket::Text, 1).unwrap();
        match guard.authorize(now, "c", Bucket::Text, 1).unwrap_err() {
            Reject::SpendCapExceeded {
                retry_after_seconds,
            } => assert_eq!(retry_after_seconds, 3600),
            other => panic!("expected SpendCapExceeded, got {other:?}"),
        }
    }

    #[test]
    fn reset_clears_one_client_only() {
        let guard = guard(1, 60, 1000);
        let now = at(1_700_000_005);
        guard.authorize(now, "a", Bucket::Text, 1).unwrap();
        guard.authorize(now, "b", Bucket::Text, 1).unwrap();
        guard.reset("a");
        guard.authorize(now, "a", Bucket::Text, 1).unwrap();
        assert!(guard.authorize(now, "b", Bucket::Text, 1).is_err());
    }

    #[test]
    fn detection_costs_follow_the_table() {
        assert_eq!(detection_cost(ContentType::Text), 1);
        assert_eq!(detection_cost(ContentType::Image), 3);
        assert_eq!(detection_cost(ContentType::Audio), 4);
        assert_eq!(detection_cost(ContentType::Video), 6);
        assert_eq!(BATCH_COST, 5);
        assert_eq!(INTEL_COST, 8);
    }
}
