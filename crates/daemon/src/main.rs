//! StatusDesk Job Engine - Main Entry Point
//! Wires the queue, idempotency layer and flags onto SQLite, then waits for Ctrl+C

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use statusdesk_core::application::{
    shutdown_channel, FlagEvaluator, IdempotencyService, IdempotencySweeper, JobQueue,
    SubmissionService,
};
use statusdesk_core::domain::FlagKey;
use statusdesk_core::port::id_provider::UuidProvider;
use statusdesk_core::port::time_provider::SystemTimeProvider;
use statusdesk_core::EngineConfig;
use statusdesk_handlers::register_default_handlers;
use statusdesk_infra_sqlite::{
    create_pool, database_url, run_migrations, SqliteDatastore, SqliteDeadLetterSink,
    SqliteIdempotencyStore,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);
const SWEEPER_STOP_TIMEOUT: Duration = Duration::from_secs(5);

fn init_logging(log_format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("statusdesk=info"))
        .context("Failed to create env filter")?;

    match log_format {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration + logging
    let mut config = EngineConfig::from_env();
    init_logging(&config.log_format)?;

    info!("StatusDesk job engine v{} starting...", VERSION);

    let flags = Arc::new(FlagEvaluator::new(config.flag_overrides.clone()));
    if !flags.is_enabled_sync(FlagKey::QueueProcessingEnabled) {
        warn!("queue_processing_enabled is off; jobs will be recorded but not run");
        config.queue.enabled = false;
    }

    // 2. Database
    let db_path = shellexpand::tilde(&config.db_path).into_owned();
    if let Some(parent) = Path::new(&db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    info!(db_path = %db_path, "Initializing database...");
    let pool = create_pool(&database_url(&db_path))
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 3. DI wiring
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);

    let idempotency_store = Arc::new(SqliteIdempotencyStore::new(
        pool.clone(),
        config.idempotency.ttl,
        time_provider.clone(),
    ));
    let datastore = Arc::new(SqliteDatastore::new(
        pool.clone(),
        id_provider.clone(),
        time_provider.clone(),
    ));

    let queue = JobQueue::new(
        config.queue.clone(),
        Arc::new(SqliteDeadLetterSink::new(pool.clone())),
        time_provider.clone(),
        id_provider,
    );
    register_default_handlers(&queue, datastore);

    let idempotency = Arc::new(IdempotencyService::new(
        &config.idempotency,
        idempotency_store.clone(),
        time_provider,
    ));
    let submissions = SubmissionService::new(
        queue.clone(),
        idempotency,
        flags.clone(),
        config.environment.as_str(),
    );

    info!(
        job_types = ?queue.registered_job_types(),
        concurrency = config.queue.concurrency,
        queue_enabled = config.queue.enabled,
        idempotency_enabled = config.idempotency.enabled,
        environment = %config.environment,
        "Job engine wired"
    );

    // 4. Background sweeper
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let sweeper = IdempotencySweeper::new(idempotency_store, config.idempotency.sweep_interval);
    let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

    info!("System ready. Press Ctrl+C to shutdown");

    // 5. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Draining running jobs...");

    // 6. Graceful shutdown
    drop(submissions);
    shutdown_tx.shutdown();
    if tokio::time::timeout(SHUTDOWN_GRACE, queue.wait_idle())
        .await
        .is_err()
    {
        warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Jobs still running at shutdown; abandoning them"
        );
    }
    match tokio::time::timeout(SWEEPER_STOP_TIMEOUT, sweeper_handle).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Idempotency sweeper task failed"),
        Err(_) => warn!(
            timeout_secs = SWEEPER_STOP_TIMEOUT.as_secs(),
            "Idempotency sweeper did not stop in time"
        ),
    }

    if let Err(e) = flags.shutdown().await {
        error!(error = %e, "Flag provider shutdown failed");
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
