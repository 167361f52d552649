use crate::config::{EvictionConfig, JobsConfig};
use crate::error::{JobError, Result};
use crate::eviction::{EvictionReport, EvictionService};
use crate::job::{generate_job_id, JobRecord, QueueEntry, TaskArgs};
use crate::queue::memory::InMemoryQueue;
use crate::queue::QueueBackend;
use crate::registry::TaskRegistry;
use crate::store::memory::InMemoryStatusStore;
use crate::store::{StatusCounts, StatusStore};
use crate::webhook::WebhookNotifier;
use crate::worker::WorkerPool;
use serde::Serialize;
use std::sync::Arc;

/// Point-in-time queue statistics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStats {
    pub queue_length: usize,
    pub total_jobs: usize,
    pub jobs_by_status: StatusCounts,
}

/// Composition root for the job subsystem.
///
/// Owns the registry, status store, queue backend, worker pool and optional
/// eviction service, with an explicit `start`/`stop` lifecycle. Construct
/// one per process; the surrounding HTTP layer only calls `submit` and
/// `status` and returns immediately.
pub struct JobService {
    config: JobsConfig,
    registry: Arc<TaskRegistry>,
    store: Arc<dyn StatusStore>,
    queue: Arc<dyn QueueBackend>,
    pool: WorkerPool,
    eviction: Option<EvictionService>,
}

impl JobService {
    /// Wire a service around explicit backends (e.g. the Redis pair for the
    /// durable deployment mode).
    pub fn new(
        config: JobsConfig,
        store: Arc<dyn StatusStore>,
        queue: Arc<dyn QueueBackend>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        let notifier = WebhookNotifier::new(config.webhook_max_retries);
        let pool = WorkerPool::new(
            Arc::clone(&queue),
            Arc::clone(&store),
            Arc::clone(&registry),
            notifier,
            config.dequeue_timeout,
        );
        Self {
            config,
            registry,
            store,
            queue,
            pool,
            eviction: None,
        }
    }

    /// Convenience wiring for the in-process deployment mode: bounded
    /// channel queue and mutex-guarded status map.
    pub fn in_memory(config: JobsConfig) -> Self {
        let store = Arc::new(InMemoryStatusStore::new());
        let queue = Arc::new(InMemoryQueue::new(config.queue_capacity));
        Self::new(config, store, queue, Arc::new(TaskRegistry::new()))
    }

    /// Attach an age-based eviction service, started and stopped with the
    /// rest of the lifecycle.
    pub fn with_eviction(mut self, config: EvictionConfig) -> Self {
        self.eviction = Some(EvictionService::new(config));
        self
    }

    /// Override the webhook notifier (tests shrink its backoff base).
    pub fn with_notifier(self, notifier: WebhookNotifier) -> Self {
        let pool = WorkerPool::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            notifier,
            self.config.dequeue_timeout,
        );
        Self { pool, ..self }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Start the worker pool and, when configured, the eviction loop.
    pub fn start(&self) {
        self.pool.start(self.config.workers);
        if let Some(eviction) = &self.eviction {
            eviction.start();
        }
    }

    /// Cooperative shutdown: in-flight jobs finish, background loops join.
    pub async fn stop(&self) {
        self.pool.shutdown().await;
        if let Some(eviction) = &self.eviction {
            eviction.stop().await;
        }
    }

    /// Accept a job: create its record (status `queued`) and push a
    /// descriptor onto the queue.
    ///
    /// The record is created before the descriptor becomes visible, so no
    /// worker can dequeue a job whose record does not exist yet. If the
    /// enqueue is rejected the record is rolled back, so a failed submission
    /// leaves no orphan; [`JobError::QueueFull`] is distinct so callers can
    /// apply backpressure instead of reporting a processing failure.
    pub async fn submit(
        &self,
        task_name: &str,
        job_id: Option<String>,
        arguments: TaskArgs,
    ) -> Result<JobRecord> {
        let job_id = job_id.unwrap_or_else(generate_job_id);
        let record = self
            .store
            .create(&job_id, task_name, arguments.clone())
            .await?;

        let entry = QueueEntry {
            job_id: job_id.clone(),
            task_name: task_name.to_string(),
            arguments,
        };
        if let Err(e) = self.queue.enqueue(entry).await {
            // Roll back so the rejected submission leaves no orphan record.
            if let Err(rollback) = self.store.remove(&job_id).await {
                tracing::error!(job_id, error = %rollback, "Rollback of rejected submission failed");
            }
            return Err(e);
        }

        tracing::info!(job_id, task = task_name, "Job submitted");
        Ok(record)
    }

    /// Look up a job's current record.
    pub async fn status(&self, job_id: &str) -> Result<Option<JobRecord>> {
        self.store.get(job_id).await
    }

    /// Run an eviction sweep immediately, outside the scheduled timer.
    pub async fn run_eviction_now(&self) -> Result<EvictionReport> {
        match &self.eviction {
            Some(eviction) => Ok(eviction.run_now().await),
            None => Err(JobError::Config("Eviction is not configured".to_string())),
        }
    }

    /// Queue length plus per-status record counts.
    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let queue_length = self.queue.len().await?;
        let jobs_by_status = self.store.counts_by_status().await?;
        Ok(QueueStats {
            queue_length,
            total_jobs: jobs_by_status.total(),
            jobs_by_status,
        })
    }
}
