//! Rate/spend guard backends.
//!
//! Single-instance deployments use the in-process fixed-window guard from
//! `provtrack-core`. When `CACHE_URL` is configured the counters and the
//! spend ledger move to Redis so every worker shares them; the key schema
//! mirrors the in-process semantics exactly (fixed windows keyed by window
//! start, day ledger keyed by UTC date, debit rollback on cap breach).

use chrono::Utc;
use provtrack_core::ratelimit::{
    day_key, seconds_to_next_day, window_start, Bucket, GuardConfig, RateGuard, Reject, Usage,
};
use redis::AsyncCommands;

/// Backend-agnostic guard handle stored in the application state.
pub enum GuardHandle {
    InProcess(RateGuard),
    Redis {
        manager: redis::aio::ConnectionManager,
        config: GuardConfig,
    },
}

impl GuardHandle {
    pub fn in_process(config: GuardConfig) -> Self {
        GuardHandle::InProcess(RateGuard::new(config))
    }

    /// Connect the shared-cache backend.
    pub async fn redis(cache_url: &str, config: GuardConfig) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(cache_url)?;
        let manager = client.get_connection_manager().await?;
        Ok(GuardHandle::Redis { manager, config })
    }

    /// Increment-and-test the bucket window, then debit the spend ledger.
    pub async fn authorize(
        &self,
        client_id: &str,
        bucket: Bucket,
        cost_points: u32,
    ) -> Result<Usage, Reject> {
        match self {
            GuardHandle::InProcess(guard) => {
                guard.authorize(Utc::now(), client_id, bucket, cost_points)
            }
            GuardHandle::Redis { manager, config } => {
                match redis_authorize(manager.clone(), config, client_id, bucket, cost_points).await
                {
                    Ok(result) => result,
                    Err(e) => {
                        // A broken cache must not take the API down; admit
                        // the request and leave a loud trace.
                        tracing::error!(error = %e, "Rate-limit cache unavailable, admitting request");
                        Ok(Usage {
                            window_hits: 0,
                            day_points: 0,
                        })
                    }
                }
            }
        }
    }

    /// Admin reset for one client.
    pub async fn reset(&self, client_id: &str) {
        match self {
            GuardHandle::InProcess(guard) => guard.reset(client_id),
            GuardHandle::Redis { manager, config } => {
                if let Err(e) = redis_reset(manager.clone(), config, client_id).await {
                    tracing::error!(error = %e, client_id, "Failed to reset rate-limit state");
                }
            }
        }
    }
}

async fn redis_authorize(
    mut conn: redis::aio::ConnectionManager,
    config: &GuardConfig,
    client_id: &str,
    bucket: Bucket,
    cost_points: u32,
) -> Result<Result<Usage, Reject>, redis::RedisError> {
    let now = Utc::now();
    let limit = config.limit_for(bucket);
    let window_seconds = limit.window_seconds.max(1);
    let start = window_start(now, window_seconds);
    let window_key = format!("provtrack:rl:{client_id}:{}:{start}", bucket.as_str());

    let hits: i64 = conn.incr(&window_key, 1).await?;
    if hits == 1 {
        let _: () = conn.expire(&window_key, window_seconds as i64).await?;
    }
    if hits > i64::from(limit.max_requests) {
        let elapsed = now.timestamp().max(0) as u64 - start;
        return Ok(Err(Reject::RateLimited {
            retry_after_seconds: window_seconds.saturating_sub(elapsed).max(1),
        }));
    }

    let ledger_key = format!("provtrack:spend:{client_id}:{}", day_key(now));
    let points: i64 = conn.incr(&ledger_key, i64::from(cost_points)).await?;
    if points == i64::from(cost_points) {
        let _: () = conn
            .expire(&ledger_key, seconds_to_next_day(now) as i64)
            .await?;
    }
    if points > config.daily_cap_points {
        // Roll back the debit; the window increment stands.
        let _: i64 = conn.decr(&ledger_key, i64::from(cost_points)).await?;
        return Ok(Err(Reject::SpendCapExceeded {
            retry_after_seconds: seconds_to_next_day(now),
        }));
    }

    Ok(Ok(Usage {
        window_hits: hits as u32,
        day_points: points,
    }))
}

async fn redis_reset(
    mut conn: redis::aio::ConnectionManager,
    config: &GuardConfig,
    client_id: &str,
) -> Result<(), redis::RedisError> {
    let now = Utc::now();
    let mut keys: Vec<String> = vec![format!("provtrack:spend:{client_id}:{}", day_key(now))];
    for bucket in [
        Bucket::Text,
        Bucket::Media,
        Bucket::Batch,
        Bucket::Intel,
        Bucket::Default,
    ] {
        let window_seconds = config.limit_for(bucket).window_seconds.max(1);
        let start = window_start(now, window_seconds);
        keys.push(format!(
            "provtrack:rl:{client_id}:{}:{start}",
            bucket.as_str()
        ));
    }
    let _: () = conn.del(keys).await?;
    Ok(())
}
