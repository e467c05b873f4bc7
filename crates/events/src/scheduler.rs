//! Recurring intel collection with monthly budget safety.
//!
//! A single-threaded cooperative tick loop dispatches runs onto the tokio
//! worker pool; the tick itself never blocks on job execution. Budget state
//! (`SchedulerUsage`) has one writer (the tick/trigger path, serialized by
//! a lock) and is persisted to a JSON file after every mutation so a
//! restart cannot forget spent requests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use provtrack_consensus::{detect_internal, ConsensusEngine, ProbeRequest};
use provtrack_core::estimate;
use provtrack_core::hashing::content_hash_text;
use provtrack_core::types::{Severity, Timestamp};
use provtrack_db::models::analysis::CreateAnalysis;
use provtrack_db::repositories::AnalysisRepo;
use provtrack_db::DbPool;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::audit::{AuditEvent, AuditHub};
use crate::intel::{normalize_handle, XIntelCollector};
use crate::webhook::WebhookDispatcher;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_interval: Duration,
    /// Recurrence interval for every registered job.
    pub job_interval: Duration,
    pub monthly_request_cap: u32,
    pub kill_switch_on_cap: bool,
    pub window_days: u32,
    pub max_posts: u32,
    pub max_pages: u32,
    pub max_retry_seconds: u64,
    pub usage_file: PathBuf,
    pub handles: Vec<String>,
    pub query: Option<String>,
    pub dedup_window_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_interval: Duration::from_secs(30),
            job_interval: Duration::from_secs(6 * 3600),
            monthly_request_cap: 10_000,
            kill_switch_on_cap: true,
            window_days: 14,
            max_posts: 250,
            max_pages: 3,
            max_retry_seconds: 900,
            usage_file: PathBuf::from("data/scheduler_usage.json"),
            handles: Vec::new(),
            query: None,
            dedup_window_seconds: 3600,
        }
    }
}

/// Persistent monthly budget counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerUsage {
    pub month_key: String,
    pub requests_used: u32,
    pub kill_switch_armed: bool,
}

impl SchedulerUsage {
    fn fresh(month_key: String, kill_switch_armed: bool) -> Self {
        Self {
            month_key,
            requests_used: 0,
            kill_switch_armed,
        }
    }
}

/// Result of one completed (or failed) run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub handle: String,
    pub status: String,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub posts_collected: usize,
    pub requests_used: u32,
    pub analysis_id: Option<String>,
    pub is_ai_generated: Option<bool>,
    pub confidence: Option<f64>,
    pub notes: Vec<String>,
    pub error: Option<String>,
}

/// A registered recurring job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub handle: String,
    pub interval: Duration,
    pub window_days: u32,
    pub max_posts: u32,
    pub query: Option<String>,
}

#[derive(Debug, Clone)]
struct JobState {
    running: bool,
    failures: u32,
    next_eligible_at: Timestamp,
    last_completed_at: Option<Timestamp>,
    last_run: Option<RunReport>,
}

struct Job {
    spec: JobSpec,
    state: JobState,
}

/// Status snapshot for the API.
#[derive(Debug, Serialize)]
pub struct SchedulerStatus {
    pub enabled: bool,
    pub monthly_request_cap: u32,
    pub usage: SchedulerUsage,
    pub jobs: Vec<JobStatus>,
}

#[derive(Debug, Serialize)]
pub struct JobStatus {
    pub handle: String,
    pub running: bool,
    pub failures: u32,
    pub next_eligible_at: Timestamp,
    pub last_completed_at: Option<Timestamp>,
    pub last_run: Option<RunReport>,
}

/// The recurring-collection scheduler.
pub struct IntelScheduler {
    config: SchedulerConfig,
    pool: DbPool,
    engine: Arc<ConsensusEngine>,
    collector: Arc<XIntelCollector>,
    audit: Arc<AuditHub>,
    webhooks: Arc<WebhookDispatcher>,
    jobs: Mutex<HashMap<String, Job>>,
    usage: tokio::sync::Mutex<SchedulerUsage>,
    shutdown: CancellationToken,
}

impl IntelScheduler {
    /// Build the scheduler and register one job per configured handle.
    pub async fn new(
        config: SchedulerConfig,
        pool: DbPool,
        engine: Arc<ConsensusEngine>,
        collector: Arc<XIntelCollector>,
        audit: Arc<AuditHub>,
        webhooks: Arc<WebhookDispatcher>,
        shutdown: CancellationToken,
    ) -> Self {
        let now = Utc::now();
        let mut jobs = HashMap::new();
        for raw_handle in &config.handles {
            let handle = normalize_handle(raw_handle);
            if handle.is_empty() {
                continue;
            }
            jobs.insert(
                handle.clone(),
                Job {
                    spec: JobSpec {
                        handle,
                        interval: config.job_interval,
                        window_days: config.window_days,
                        max_posts: config.max_posts,
                        query: config.query.clone(),
                    },
                    state: JobState {
                        running: false,
                        failures: 0,
                        next_eligible_at: now,
                        last_completed_at: None,
                        last_run: None,
                    },
                },
            );
        }

        let usage = load_usage(&config.usage_file, config.kill_switch_on_cap).await;

        Self {
            config,
            pool,
            engine,
            collector,
            audit,
            webhooks,
            jobs: Mutex::new(jobs),
            usage: tokio::sync::Mutex::new(usage),
            shutdown,
        }
    }

    /// Run the tick loop until the shutdown token fires.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Scheduler cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// One cooperative tick: budget bookkeeping plus run dispatch.
    ///
    /// Never blocks on job execution; runs go to the worker pool.
    pub async fn tick(self: &Arc<Self>) {
        let now = Utc::now();
        if self.capped_after_rollover(now).await {
            self.audit.emit(
                AuditEvent::new("scheduler.capped")
                    .with_source("scheduler")
                    .with_severity(Severity::Warning)
                    .with_payload(json!({
                        "monthly_request_cap": self.config.monthly_request_cap,
                    })),
            );
            return;
        }

        let due: Vec<JobSpec> = {
            let jobs = self.jobs.lock().expect("scheduler jobs lock poisoned");
            jobs.values()
                .filter(|job| !job.state.running && now >= job.state.next_eligible_at)
                .map(|job| job.spec.clone())
                .collect()
        };

        for spec in due {
            if let Some(spec) = self.begin_run(&spec.handle).await {
                let scheduler = Arc::clone(self);
                tokio::spawn(async move {
                    scheduler.run_job(spec).await;
                });
            }
        }
    }

    /// Roll the month if needed; report whether the kill-switch halts work.
    async fn capped_after_rollover(&self, now: Timestamp) -> bool {
        let month_key = now.format("%Y-%m").to_string();
        let mut usage = self.usage.lock().await;
        if usage.month_key != month_key {
            tracing::info!(
                old_month = %usage.month_key,
                new_month = %month_key,
                "Scheduler month rollover, resetting request budget"
            );
            *usage = SchedulerUsage::fresh(month_key, self.config.kill_switch_on_cap);
            save_usage(&self.config.usage_file, &usage).await;
        }
        usage.kill_switch_armed && usage.requests_used >= self.config.monthly_request_cap
    }

    /// Claim the single-flight slot and the request budget for one run.
    ///
    /// Returns the job spec when the run may start. The running flag is set
    /// before the budget debit so two concurrent dispatch paths can never
    /// both start the same job.
    async fn begin_run(self: &Arc<Self>, handle: &str) -> Option<JobSpec> {
        let spec = {
            let mut jobs = self.jobs.lock().expect("scheduler jobs lock poisoned");
            let job = jobs.get_mut(handle)?;
            if job.state.running {
                return None;
            }
            job.state.running = true;
            job.spec.clone()
        };

        let plan = estimate::request_plan(spec.max_posts, self.config.max_pages);
        let estimate = plan.estimated_requests;
        let mut usage = self.usage.lock().await;
        if usage.requests_used + estimate > self.config.monthly_request_cap {
            drop(usage);
            self.release_running(handle);
            self.audit.emit(
                AuditEvent::new("scheduler.budget_skip")
                    .with_source("scheduler")
                    .with_severity(Severity::Warning)
                    .with_payload(json!({
                        "handle": handle,
                        "requests_estimate": estimate,
                        "monthly_request_cap": self.config.monthly_request_cap,
                    })),
            );
            return None;
        }
        usage.requests_used += estimate;
        save_usage(&self.config.usage_file, &usage).await;
        Some(spec)
    }

    fn release_running(&self, handle: &str) {
        let mut jobs = self.jobs.lock().expect("scheduler jobs lock poisoned");
        if let Some(job) = jobs.get_mut(handle) {
            job.state.running = false;
        }
    }

    /// Execute one run to completion and record its outcome.
    async fn run_job(self: Arc<Self>, spec: JobSpec) -> RunReport {
        let started_at = Utc::now();
        let result = self.execute_run(&spec).await;
        let finished_at = Utc::now();

        let report = match result {
            Ok(mut report) => {
                report.started_at = started_at;
                report.finished_at = finished_at;
                report
            }
            Err(error) => RunReport {
                handle: spec.handle.clone(),
                status: "failed".to_string(),
                started_at,
                finished_at,
                posts_collected: 0,
                requests_used: 0,
                analysis_id: None,
                is_ai_generated: None,
                confidence: None,
                notes: Vec::new(),
                error: Some(error),
            },
        };

        let success = report.status != "failed";
        self.finish_run(&spec.handle, report.clone(), success);

        if success {
            tracing::info!(
                handle = %report.handle,
                posts = report.posts_collected,
                analysis_id = ?report.analysis_id,
                "Scheduled collection run complete"
            );
            self.audit.emit(
                AuditEvent::new("scheduler.run")
                    .with_source("scheduler")
                    .with_payload(
                        serde_json::to_value(&report).unwrap_or_else(|_| json!({})),
                    ),
            );
            self.webhooks
                .enqueue_event(
                    "scheduled_collection.completed",
                    serde_json::to_value(&report).unwrap_or_else(|_| json!({})),
                )
                .await;
        } else {
            tracing::warn!(
                handle = %report.handle,
                error = ?report.error,
                "Scheduled collection run failed"
            );
            self.audit.emit(
                AuditEvent::new("scheduler.run_failed")
                    .with_source("scheduler")
                    .with_severity(Severity::Error)
                    .with_payload(
                        serde_json::to_value(&report).unwrap_or_else(|_| json!({})),
                    ),
            );
            self.webhooks
                .enqueue_event(
                    "scheduled_collection.failed",
                    serde_json::to_value(&report).unwrap_or_else(|_| json!({})),
                )
                .await;
        }

        report
    }

    /// Collection, scoring, and persistence for one run.
    async fn execute_run(&self, spec: &JobSpec) -> Result<RunReport, String> {
        let collected = self
            .collector
            .collect(
                &spec.handle,
                spec.window_days,
                spec.max_posts,
                spec.query.as_deref(),
            )
            .await
            .map_err(|e| e.to_string())?;

        // Runs are not cancellable mid-step; the shutdown flag is only
        // consulted between the collection and report phases.
        if self.shutdown.is_cancelled() {
            return Err("shutdown requested before report phase".to_string());
        }

        let aggregated = collected.posts.join("\n\n");
        let mut report = RunReport {
            handle: collected.handle.clone(),
            status: "success".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            posts_collected: collected.posts.len(),
            requests_used: collected.requests_used,
            analysis_id: None,
            is_ai_generated: None,
            confidence: None,
            notes: collected.notes.clone(),
            error: None,
        };

        if aggregated.trim().is_empty() {
            report.notes.push("no posts collected in window".to_string());
            return Ok(report);
        }

        let request = ProbeRequest::text(&aggregated);
        let internal = detect_internal(&request).map_err(|e| e.to_string())?;
        let summary = self
            .engine
            .score(&internal, &request)
            .await
            .map_err(|e| e.to_string())?;

        let mut model_prediction = internal.model_prediction.clone();
        if summary.is_ai_generated && model_prediction.is_none() {
            model_prediction = Some("unknown".to_string());
        }

        let create = CreateAnalysis {
            analysis_id: uuid::Uuid::new_v4().to_string(),
            content_type: "text".to_string(),
            content_hash: content_hash_text(&aggregated),
            is_ai_generated: summary.is_ai_generated,
            confidence: summary.final_probability,
            model_prediction,
            result_payload: json!({
                "signals": &internal.signals,
                "explanation": &internal.explanation,
                "consensus": &summary,
                "intel": {
                    "handle": collected.handle,
                    "posts_collected": collected.posts.len(),
                    "requests_used": collected.requests_used,
                    "notes": collected.notes,
                },
            }),
            source: "scheduled".to_string(),
            source_url: Some(format!("https://x.com/{}", collected.handle)),
            filename: None,
            input_size: aggregated.len() as i64,
        };

        let outcome = AnalysisRepo::put(&self.pool, &create, self.config.dedup_window_seconds)
            .await
            .map_err(|e| format!("persistence failed: {e}"))?;

        report.analysis_id = Some(outcome.analysis_id);
        report.is_ai_generated = Some(summary.is_ai_generated);
        report.confidence = Some(summary.final_probability);
        Ok(report)
    }

    /// Store the run outcome. A job removed mid-run stays removed; the
    /// completed run's record and webhook have already been persisted.
    fn finish_run(&self, handle: &str, report: RunReport, success: bool) {
        let now = Utc::now();
        let mut jobs = self.jobs.lock().expect("scheduler jobs lock poisoned");
        let Some(job) = jobs.get_mut(handle) else {
            return;
        };
        job.state.running = false;
        if success {
            job.state.failures = 0;
            job.state.last_completed_at = Some(now);
            job.state.next_eligible_at =
                now + chrono::Duration::from_std(job.spec.interval)
                    .unwrap_or_else(|_| chrono::Duration::seconds(3600));
        } else {
            job.state.failures += 1;
            let backoff_seconds = 2u64
                .saturating_pow(job.state.failures.min(30))
                .min(self.config.max_retry_seconds);
            job.state.next_eligible_at = now + chrono::Duration::seconds(backoff_seconds as i64);
        }
        job.state.last_run = Some(report);
    }

    /// Run one job (or all) immediately, honoring the budget and the
    /// single-flight guard. Used by the trigger endpoint.
    pub async fn trigger(self: &Arc<Self>, handle: Option<&str>) -> Vec<RunReport> {
        let handles: Vec<String> = match handle {
            Some(h) => vec![normalize_handle(h)],
            None => {
                let jobs = self.jobs.lock().expect("scheduler jobs lock poisoned");
                jobs.keys().cloned().collect()
            }
        };

        let mut reports = Vec::new();
        for handle in handles {
            match self.begin_run(&handle).await {
                Some(spec) => reports.push(Arc::clone(self).run_job(spec).await),
                None => {
                    let now = Utc::now();
                    reports.push(RunReport {
                        handle,
                        status: "skipped".to_string(),
                        started_at: now,
                        finished_at: now,
                        posts_collected: 0,
                        requests_used: 0,
                        analysis_id: None,
                        is_ai_generated: None,
                        confidence: None,
                        notes: vec![
                            "run skipped: unknown job, already running, or budget exhausted"
                                .to_string(),
                        ],
                        error: None,
                    });
                }
            }
        }
        reports
    }

    /// Remove a job between ticks. An in-flight run completes and its
    /// result is still persisted.
    pub fn remove_job(&self, handle: &str) -> bool {
        let mut jobs = self.jobs.lock().expect("scheduler jobs lock poisoned");
        jobs.remove(&normalize_handle(handle)).is_some()
    }

    /// Operator action: disarm the kill-switch for the current month.
    pub async fn clear_kill_switch(&self) {
        let mut usage = self.usage.lock().await;
        usage.kill_switch_armed = false;
        save_usage(&self.config.usage_file, &usage).await;
        self.audit.emit(
            AuditEvent::new("scheduler.kill_switch_cleared")
                .with_source("scheduler")
                .with_payload(json!({ "month_key": usage.month_key })),
        );
    }

    /// Snapshot for the status endpoint.
    pub async fn status(&self) -> SchedulerStatus {
        let usage = self.usage.lock().await.clone();
        let jobs = self.jobs.lock().expect("scheduler jobs lock poisoned");
        let mut job_statuses: Vec<JobStatus> = jobs
            .values()
            .map(|job| JobStatus {
                handle: job.spec.handle.clone(),
                running: job.state.running,
                failures: job.state.failures,
                next_eligible_at: job.state.next_eligible_at,
                last_completed_at: job.state.last_completed_at,
                last_run: job.state.last_run.clone(),
            })
            .collect();
        job_statuses.sort_by(|a, b| a.handle.cmp(&b.handle));

        SchedulerStatus {
            enabled: self.config.enabled,
            monthly_request_cap: self.config.monthly_request_cap,
            usage,
            jobs: job_statuses,
        }
    }
}

/// Read the usage file, falling back to a fresh counter for this month.
async fn load_usage(path: &std::path::Path, kill_switch_on_cap: bool) -> SchedulerUsage {
    let month_key = Utc::now().format("%Y-%m").to_string();
    match tokio::fs::read(path).await {
        Ok(content) => match serde_json::from_slice::<SchedulerUsage>(&content) {
            Ok(usage) if usage.month_key == month_key => usage,
            Ok(_) | Err(_) => SchedulerUsage::fresh(month_key, kill_switch_on_cap),
        },
        Err(_) => SchedulerUsage::fresh(month_key, kill_switch_on_cap),
    }
}

/// Persist the usage file, best effort.
async fn save_usage(path: &std::path::Path, usage: &SchedulerUsage) {
    if let Some(parent) = path.parent() {
        let _ = tokio::fs::create_dir_all(parent).await;
    }
    let body = serde_json::to_vec_pretty(usage).expect("usage always serializes");
    if let Err(e) = tokio::fs::write(path, body).await {
        tracing::error!(path = %path.display(), error = %e, "Failed to persist scheduler usage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::WebhookConfig;
    use provtrack_consensus::Thresholds;
    use crate::intel::XIntelConfig;

    /// Scheduler wired to a lazy pool and an unreachable collector; budget
    /// and single-flight behaviour never touch the database.
    async fn test_scheduler(cap: u32, handles: Vec<String>) -> Arc<IntelScheduler> {
        let dir = tempfile::tempdir().unwrap();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/provtrack_test")
            .unwrap();
        let audit = Arc::new(AuditHub::new(true, 100));
        let webhooks = Arc::new(
            WebhookDispatcher::new(
                WebhookConfig {
                    urls: Vec::new(),
                    queue_file: dir.path().join("queue.json"),
                    dead_letter_file: dir.path().join("dlq.jsonl"),
                    ..Default::default()
                },
                Arc::clone(&audit),
            )
            .await,
        );
        let engine = Arc::new(ConsensusEngine::new(
            0.6,
            true,
            Duration::from_secs(2),
            Thresholds::default(),
            Vec::new(),
        ));
        let collector = Arc::new(XIntelCollector::new(XIntelConfig::default()));
        let config = SchedulerConfig {
            enabled: true,
            monthly_request_cap: cap,
            usage_file: dir.path().join("usage.json"),
            handles,
            ..Default::default()
        };
        std::mem::forget(dir);
        Arc::new(
            IntelScheduler::new(
                config,
                pool,
                engine,
                collector,
                audit,
                webhooks,
                CancellationToken::new(),
            )
            .await,
        )
    }

    #[tokio::test]
    async fn at_most_one_concurrent_run_per_job() {
        let scheduler = test_scheduler(1000, vec!["@brand".into()]).await;
        let first = scheduler.begin_run("brand").await;
        assert!(first.is_some());
        // The slot is held until the run finishes.
        assert!(scheduler.begin_run("brand").await.is_none());
        scheduler.release_running("brand");
        assert!(scheduler.begin_run("brand").await.is_some());
    }

    #[tokio::test]
    async fn budget_exhaustion_skips_dispatch_and_audits() {
        // Default job shape estimates 5 requests per run; a cap of 12
        // allows two dispatches (usage 5, then 10) and blocks the third.
        let scheduler = test_scheduler(12, vec!["@brand".into()]).await;

        assert!(scheduler.begin_run("brand").await.is_some());
        scheduler.release_running("brand");
        assert!(scheduler.begin_run("brand").await.is_some());
        scheduler.release_running("brand");
        assert!(scheduler.begin_run("brand").await.is_none());

        let usage = scheduler.usage.lock().await;
        assert_eq!(usage.requests_used, 10);
        drop(usage);

        let events = scheduler.audit.ring().tail(10, &Default::default());
        assert!(events.iter().any(|e| e.event_type == "scheduler.budget_skip"));
    }

    #[tokio::test]
    async fn capped_tick_emits_one_audit_event_and_dispatches_nothing() {
        let scheduler = test_scheduler(0, vec!["@brand".into()]).await;
        scheduler.tick().await;

        let events = scheduler.audit.ring().tail(10, &Default::default());
        assert!(events.iter().any(|e| e.event_type == "scheduler.capped"));
        let jobs = scheduler.jobs.lock().unwrap();
        assert!(!jobs["brand"].state.running);
    }

    #[tokio::test]
    async fn failed_run_backs_off_and_counts_failures() {
        // The collector has no bearer token, so the run fails fast.
        let scheduler = test_scheduler(1000, vec!["@brand".into()]).await;
        let reports = scheduler.trigger(Some("@brand")).await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, "failed");
        assert!(reports[0].error.is_some());

        let jobs = scheduler.jobs.lock().unwrap();
        let state = &jobs["brand"].state;
        assert!(!state.running);
        assert_eq!(state.failures, 1);
        assert!(state.next_eligible_at > Utc::now());
    }

    #[tokio::test]
    async fn trigger_on_unknown_job_reports_skipped() {
        let scheduler = test_scheduler(1000, vec![]).await;
        let reports = scheduler.trigger(Some("ghost")).await;
        assert_eq!(reports[0].status, "skipped");
    }

    #[tokio::test]
    async fn removed_job_is_gone_from_status() {
        let scheduler = test_scheduler(1000, vec!["@brand".into()]).await;
        assert!(scheduler.remove_job("brand"));
        assert!(!scheduler.remove_job("brand"));
        assert!(scheduler.status().await.jobs.is_empty());
    }

    #[tokio::test]
    async fn usage_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler_usage.json");
        let month_key = Utc::now().format("%Y-%m").to_string();

        let usage = SchedulerUsage {
            month_key: month_key.clone(),
            requests_used: 40,
            kill_switch_armed: true,
        };
        save_usage(&path, &usage).await;

        let loaded = load_usage(&path, true).await;
        assert_eq!(loaded.requests_used, 40);
        assert_eq!(loaded.month_key, month_key);
    }

    #[tokio::test]
    async fn stale_month_in_the_file_resets_the_counter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheduler_usage.json");

        let stale = SchedulerUsage {
            month_key: "2020-01".to_string(),
            requests_used: 9999,
            kill_switch_armed: false,
        };
        save_usage(&path, &stale).await;

        let loaded = load_usage(&path, true).await;
        assert_eq!(loaded.requests_used, 0);
        assert!(loaded.kill_switch_armed);
    }

    #[tokio::test]
    async fn missing_file_yields_a_fresh_counter() {
        let loaded = load_usage(std::path::Path::new("/nonexistent/usage.json"), false).await;
        assert_eq!(loaded.requests_used, 0);
        assert!(!loaded.kill_switch_armed);
    }
}
