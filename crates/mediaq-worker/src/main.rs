//! Durable-queue worker process.
//!
//! Pulls job descriptors from the shared Redis backlog, runs registered
//! task bodies, records lifecycle transitions, delivers webhooks, and
//! evicts aged artifacts. Any number of these processes can consume the
//! same backlog.

mod settings;
mod tasks;

use mediaq::{JobError, JobService, RedisQueue, RedisStatusStore, TaskRegistry};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "Worker exited with error");
        std::process::exit(1);
    }
}

async fn run() -> mediaq::Result<()> {
    let settings = settings::load().map_err(|e| JobError::Config(e.to_string()))?;
    tracing::info!(
        redis_url = %settings.redis_url,
        workers = settings.workers,
        "Starting mediaq worker"
    );

    let store = Arc::new(RedisStatusStore::new(&settings.redis_url, &settings.namespace)?);
    let queue = Arc::new(RedisQueue::new(
        &settings.redis_url,
        &settings.namespace,
        settings.poll_interval(),
    )?);
    let registry = Arc::new(TaskRegistry::new());
    tasks::register_builtin(&registry);

    let service = JobService::new(settings.jobs_config(), store, queue, registry)
        .with_eviction(settings.eviction_config());
    service.start();

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, draining in-flight jobs");
    service.stop().await;
    tracing::info!("Worker stopped cleanly");
    Ok(())
}

/// Resolves on ctrl-c, or additionally on SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await;
}
