use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use provtrack_api::config::AppConfig;
use provtrack_api::limiter::GuardHandle;
use provtrack_api::router::build_app_router;
use provtrack_api::state::AppState;
use provtrack_consensus::providers::{
    C2paProvider, CopyleaksProvider, HiveProvider, RealityDefenderProvider,
};
use provtrack_consensus::{ConsensusEngine, Provider};
use provtrack_events::intel::XIntelCollector;
use provtrack_events::{AuditHub, AuditPersistence, IntelScheduler, WebhookDispatcher};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "provtrack_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = Arc::new(AppConfig::from_env());
    tracing::info!(host = %config.host, port = config.port, "Loaded server configuration");

    // --- Database ---
    let pool = provtrack_db::create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    provtrack_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    provtrack_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready, migrations applied");

    // --- Audit pipeline ---
    let audit = Arc::new(AuditHub::new(
        config.audit_enabled,
        config.audit_ring_capacity,
    ));
    let persistence_handle = tokio::spawn(AuditPersistence::run(pool.clone(), audit.subscribe()));
    tracing::info!(ring_capacity = config.audit_ring_capacity, "Audit pipeline started");

    // --- Rate/spend guard ---
    let guard = match &config.cache_url {
        Some(cache_url) => match GuardHandle::redis(cache_url, config.guard.clone()).await {
            Ok(handle) => {
                tracing::info!("Rate-limit guard using shared cache");
                handle
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache unavailable, using in-process rate-limit guard");
                GuardHandle::in_process(config.guard.clone())
            }
        },
        None => GuardHandle::in_process(config.guard.clone()),
    };
    let guard = Arc::new(guard);

    // --- Consensus engine ---
    let engine = Arc::new(build_engine(&config));

    // --- Webhook dispatcher ---
    let webhooks = Arc::new(WebhookDispatcher::new(config.webhook.clone(), Arc::clone(&audit)).await);
    let webhook_cancel = CancellationToken::new();
    let webhook_handle = tokio::spawn(Arc::clone(&webhooks).run(webhook_cancel.clone()));
    tracing::info!(urls = config.webhook.urls.len(), "Webhook dispatcher started");

    // --- Scheduler ---
    let collector = Arc::new(XIntelCollector::new(config.intel.clone()));
    let scheduler_cancel = CancellationToken::new();
    let scheduler = Arc::new(
        IntelScheduler::new(
            config.scheduler.clone(),
            pool.clone(),
            Arc::clone(&engine),
            collector,
            Arc::clone(&audit),
            Arc::clone(&webhooks),
            scheduler_cancel.clone(),
        )
        .await,
    );
    let scheduler_handle = if config.scheduler.enabled {
        tracing::info!(
            handles = config.scheduler.handles.len(),
            tick_secs = config.scheduler.tick_interval.as_secs(),
            "Scheduler started"
        );
        Some(tokio::spawn(Arc::clone(&scheduler).run()))
    } else {
        None
    };

    // --- App state + router ---
    let state = AppState {
        pool,
        config: Arc::clone(&config),
        engine,
        audit: Arc::clone(&audit),
        webhooks,
        scheduler,
        guard,
        http_client: reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .expect("Failed to build outbound HTTP client"),
    };
    let app = build_app_router(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    let cleanup_timeout = Duration::from_secs(config.shutdown_timeout_secs);

    // Stop the scheduler first; in-flight runs finish and persist.
    scheduler_cancel.cancel();
    if let Some(handle) = scheduler_handle {
        let _ = tokio::time::timeout(cleanup_timeout, handle).await;
        tracing::info!("Scheduler stopped");
    }

    // The webhook drain completes its current item and exits.
    webhook_cancel.cancel();
    let _ = tokio::time::timeout(cleanup_timeout, webhook_handle).await;
    tracing::info!("Webhook dispatcher stopped");

    // Dropping the last audit hub closes the broadcast channel, which
    // signals persistence to exit once the backlog is flushed.
    drop(audit);
    let _ = tokio::time::timeout(cleanup_timeout, persistence_handle).await;
    tracing::info!("Audit persistence stopped, graceful shutdown complete");
}

/// Instantiate only the providers that are actually configured.
fn build_engine(config: &AppConfig) -> ConsensusEngine {
    let client = reqwest::Client::new();
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();

    if config.copyleaks.api_key.is_some() {
        providers.push(Arc::new(CopyleaksProvider::new(
            client.clone(),
            config.copyleaks.api_url.clone(),
            config.copyleaks.api_key.clone(),
            config.copyleaks.weight,
            config.provider_retry_attempts,
            config.provider_retry_backoff,
        )));
    }
    if config.reality_defender.api_key.is_some() {
        providers.push(Arc::new(RealityDefenderProvider::new(
            client.clone(),
            config.reality_defender.api_url.clone(),
            config.reality_defender.api_key.clone(),
            config.reality_defender.weight,
            config.provider_retry_attempts,
            config.provider_retry_backoff,
        )));
    }
    if config.hive.api_key.is_some() {
        providers.push(Arc::new(HiveProvider::new(
            client.clone(),
            config.hive.api_url.clone(),
            config.hive.api_key.clone(),
            config.hive.weight,
            config.provider_retry_attempts,
            config.provider_retry_backoff,
        )));
    }
    if config.c2pa_enabled {
        providers.push(Arc::new(C2paProvider::new(
            true,
            config.c2pa_tool_path.clone(),
            config.c2pa_weight,
            config.c2pa_verify_timeout,
        )));
    }

    tracing::info!(
        external_providers = providers.len(),
        consensus_enabled = config.consensus_enabled,
        "Consensus engine configured"
    );

    ConsensusEngine::new(
        config.internal_weight,
        config.consensus_enabled,
        config.provider_timeout,
        config.thresholds,
        providers,
    )
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
