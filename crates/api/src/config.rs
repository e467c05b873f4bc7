//! Application configuration loaded from environment variables.
//!
//! Every knob has a development-safe default; production overrides via the
//! environment. Parse failures panic at startup, which is the desired
//! behaviour: misconfiguration must fail fast with a non-zero exit.

use std::path::PathBuf;
use std::time::Duration;

use provtrack_core::ratelimit::{BucketLimit, GuardConfig};
use provtrack_events::scheduler::SchedulerConfig;
use provtrack_events::webhook::WebhookConfig;
use provtrack_events::intel::XIntelConfig;
use provtrack_consensus::Thresholds;

/// Parse an env var, falling back to a default.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

/// Optional env var, empty treated as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Comma-separated env var.
fn env_csv(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(raw) => matches!(raw.trim(), "1" | "true" | "TRUE" | "True" | "yes" | "on"),
        Err(_) => default,
    }
}

/// One external provider's adapter settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub weight: f64,
}

/// Full server configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Server
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub shutdown_timeout_secs: u64,

    // Persistence
    pub database_url: String,
    pub cache_url: Option<String>,

    // Auth + metering
    pub require_api_key: bool,
    pub api_keys: Vec<String>,
    pub guard: GuardConfig,

    // Input limits
    pub min_text_length: usize,
    pub max_text_length: usize,
    pub max_image_bytes: usize,
    pub max_audio_bytes: usize,
    pub max_video_bytes: usize,
    pub max_batch_items: usize,

    // Consensus
    pub consensus_enabled: bool,
    pub provider_timeout: Duration,
    pub provider_retry_attempts: u32,
    pub provider_retry_backoff: Duration,
    pub internal_weight: f64,
    pub thresholds: Thresholds,
    pub copyleaks: ProviderConfig,
    pub reality_defender: ProviderConfig,
    pub hive: ProviderConfig,
    pub c2pa_enabled: bool,
    pub c2pa_tool_path: String,
    pub c2pa_weight: f64,
    pub c2pa_verify_timeout: Duration,

    // Store
    pub dedup_window_seconds: u64,
    pub retention_days: i64,

    // Audit
    pub audit_enabled: bool,
    pub audit_ring_capacity: usize,
    pub audit_log_http_requests: bool,

    // Background services
    pub scheduler: SchedulerConfig,
    pub webhook: WebhookConfig,
    pub intel: XIntelConfig,
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        let dedup_window_seconds = env_or("DEDUP_WINDOW_SECONDS", 3600u64);

        let guard = GuardConfig {
            text: BucketLimit {
                max_requests: env_or("RATE_LIMIT_TEXT_REQUESTS", 100),
                window_seconds: env_or("RATE_LIMIT_TEXT_WINDOW_SECONDS", 60),
            },
            media: BucketLimit {
                max_requests: env_or("RATE_LIMIT_MEDIA_REQUESTS", 40),
                window_seconds: env_or("RATE_LIMIT_MEDIA_WINDOW_SECONDS", 60),
            },
            batch: BucketLimit {
                max_requests: env_or("RATE_LIMIT_BATCH_REQUESTS", 20),
                window_seconds: env_or("RATE_LIMIT_BATCH_WINDOW_SECONDS", 60),
            },
            intel: BucketLimit {
                max_requests: env_or("RATE_LIMIT_INTEL_REQUESTS", 20),
                window_seconds: env_or("RATE_LIMIT_INTEL_WINDOW_SECONDS", 60),
            },
            default: BucketLimit {
                max_requests: env_or("RATE_LIMIT_DEFAULT_REQUESTS", 100),
                window_seconds: env_or("RATE_LIMIT_DEFAULT_WINDOW_SECONDS", 60),
            },
            daily_cap_points: env_or("DAILY_SPEND_CAP_POINTS", 1000),
        };

        let scheduler = SchedulerConfig {
            enabled: env_flag("SCHEDULER_ENABLED", false),
            tick_interval: Duration::from_secs(env_or("SCHEDULER_TICK_SECONDS", 30)),
            job_interval: Duration::from_secs(env_or("SCHEDULER_JOB_INTERVAL_SECONDS", 21_600)),
            monthly_request_cap: env_or("SCHEDULER_MONTHLY_REQUEST_CAP", 10_000),
            kill_switch_on_cap: env_flag("SCHEDULER_KILL_SWITCH_ON_CAP", true),
            window_days: env_or("SCHEDULER_WINDOW_DAYS", 14),
            max_posts: env_or("SCHEDULER_MAX_POSTS", 250),
            max_pages: env_or("X_MAX_PAGES", 3),
            max_retry_seconds: env_or("SCHEDULER_MAX_RETRY_SECONDS", 900),
            usage_file: PathBuf::from(
                env_opt("SCHEDULER_USAGE_FILE")
                    .unwrap_or_else(|| "data/scheduler_usage.json".to_string()),
            ),
            handles: env_csv("SCHEDULER_HANDLES", &[]),
            query: env_opt("SCHEDULER_QUERY"),
            dedup_window_seconds,
        };

        let webhook = WebhookConfig {
            urls: env_csv("WEBHOOK_URLS", &[]),
            max_attempts: env_or("WEBHOOK_MAX_ATTEMPTS", 5),
            base_backoff: Duration::from_secs(env_or("WEBHOOK_BASE_BACKOFF_SECONDS", 2)),
            max_backoff: Duration::from_secs(env_or("WEBHOOK_MAX_BACKOFF_SECONDS", 300)),
            request_timeout: Duration::from_secs(env_or("WEBHOOK_TIMEOUT_SECONDS", 10)),
            drain_interval: Duration::from_secs(env_or("WEBHOOK_DRAIN_INTERVAL_SECONDS", 2)),
            secret: env_opt("WEBHOOK_SECRET"),
            queue_file: PathBuf::from(
                env_opt("WEBHOOK_QUEUE_FILE").unwrap_or_else(|| "data/webhook_queue.json".into()),
            ),
            dead_letter_file: PathBuf::from(
                env_opt("WEBHOOK_DEAD_LETTER_FILE")
                    .unwrap_or_else(|| "data/webhook_dead_letter.jsonl".into()),
            ),
        };

        let intel = XIntelConfig {
            bearer_token: env_opt("X_BEARER_TOKEN"),
            api_base_url: env_opt("X_API_BASE_URL")
                .unwrap_or_else(|| "https://api.x.com/2".to_string()),
            max_pages: env_or("X_MAX_PAGES", 3),
            request_timeout: Duration::from_secs(env_or("X_REQUEST_TIMEOUT_SECONDS", 15)),
        };

        Self {
            host: env_opt("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_or("PORT", 8000),
            cors_origins: env_csv("CORS_ORIGINS", &["http://localhost:3000"]),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),

            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            cache_url: env_opt("CACHE_URL"),

            require_api_key: env_flag("REQUIRE_API_KEY", false),
            api_keys: env_csv("API_KEYS", &[]),
            guard,

            min_text_length: env_or("MIN_TEXT_LENGTH", 50),
            max_text_length: env_or("MAX_TEXT_LENGTH", 50_000),
            max_image_bytes: env_or("MAX_IMAGE_SIZE_MB", 10usize) * 1024 * 1024,
            max_audio_bytes: env_or("MAX_AUDIO_SIZE_MB", 25usize) * 1024 * 1024,
            max_video_bytes: env_or("MAX_VIDEO_SIZE_MB", 150usize) * 1024 * 1024,
            max_batch_items: env_or("MAX_BATCH_ITEMS", 50),

            consensus_enabled: env_flag("CONSENSUS_ENABLED", true),
            provider_timeout: Duration::from_secs(env_or("PROVIDER_TIMEOUT_SECONDS", 8)),
            provider_retry_attempts: env_or("PROVIDER_RETRY_ATTEMPTS", 3),
            provider_retry_backoff: Duration::from_secs(env_or(
                "PROVIDER_RETRY_BACKOFF_SECONDS",
                1,
            )),
            internal_weight: env_or("PROVIDER_INTERNAL_WEIGHT", 0.6),
            thresholds: Thresholds {
                text: env_or("THRESHOLD_TEXT", 0.5),
                image: env_or("THRESHOLD_IMAGE", 0.5),
                audio: env_or("THRESHOLD_AUDIO", 0.5),
                video: env_or("THRESHOLD_VIDEO", 0.5),
            },
            copyleaks: ProviderConfig {
                api_url: env_opt("COPYLEAKS_API_URL")
                    .unwrap_or_else(|| "https://api.copyleaks.com/v2/writer-detector".into()),
                api_key: env_opt("COPYLEAKS_API_KEY"),
                weight: env_or("PROVIDER_COPYLEAKS_WEIGHT", 0.4),
            },
            reality_defender: ProviderConfig {
                api_url: env_opt("REALITY_DEFENDER_API_URL")
                    .unwrap_or_else(|| "https://api.realitydefender.com/v1/detect".into()),
                api_key: env_opt("REALITY_DEFENDER_API_KEY"),
                weight: env_or("PROVIDER_REALITY_DEFENDER_WEIGHT", 0.4),
            },
            hive: ProviderConfig {
                api_url: env_opt("HIVE_API_URL")
                    .unwrap_or_else(|| "https://api.thehive.ai/api/v2/task/sync".into()),
                api_key: env_opt("HIVE_API_KEY"),
                weight: env_or("PROVIDER_HIVE_WEIGHT", 0.3),
            },
            c2pa_enabled: env_flag("C2PA_ENABLED", false),
            c2pa_tool_path: env_opt("C2PA_CLI_PATH").unwrap_or_else(|| "c2patool".to_string()),
            c2pa_weight: env_or("PROVIDER_C2PA_WEIGHT", 0.5),
            c2pa_verify_timeout: Duration::from_secs(env_or("C2PA_VERIFY_TIMEOUT_SECONDS", 10)),

            dedup_window_seconds,
            retention_days: env_or("RETENTION_DAYS", 90),

            audit_enabled: env_flag("AUDIT_ENABLED", true),
            audit_ring_capacity: env_or("AUDIT_RING_CAPACITY", 20_000),
            audit_log_http_requests: env_flag("AUDIT_LOG_HTTP_REQUESTS", true),

            scheduler,
            webhook,
            intel,
        }
    }
}
