use crate::job::{JobStatus, QueueEntry, TaskArgs};
use crate::queue::QueueBackend;
use crate::registry::TaskRegistry;
use crate::store::StatusStore;
use crate::task::{TaskContext, TaskError};
use crate::webhook::WebhookNotifier;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Everything a worker loop needs, shared across the pool.
struct WorkerContext {
    queue: Arc<dyn QueueBackend>,
    store: Arc<dyn StatusStore>,
    registry: Arc<TaskRegistry>,
    notifier: WebhookNotifier,
    dequeue_timeout: Duration,
}

/// A fixed-size set of long-lived worker loops.
///
/// Workers share one queue backend and one status store and assume no
/// serialized access to either. The pool has an explicit `start`/`shutdown`
/// lifecycle owned by the composition root; shutdown is cooperative, raised
/// through a watch flag that each worker observes between dequeue attempts,
/// so in-flight work always finishes.
pub struct WorkerPool {
    ctx: Arc<WorkerContext>,
    shutdown: watch::Sender<bool>,
    handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn QueueBackend>,
        store: Arc<dyn StatusStore>,
        registry: Arc<TaskRegistry>,
        notifier: WebhookNotifier,
        dequeue_timeout: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            ctx: Arc::new(WorkerContext {
                queue,
                store,
                registry,
                notifier,
                dequeue_timeout,
            }),
            shutdown,
            handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Spawn `n` worker loops.
    pub fn start(&self, n: usize) {
        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        for worker_id in 0..n {
            let ctx = Arc::clone(&self.ctx);
            let shutdown_rx = self.shutdown.subscribe();
            handles.push(tokio::spawn(run_worker(worker_id, ctx, shutdown_rx)));
        }
        tracing::info!(workers = n, "Worker pool started");
    }

    /// Signal shutdown and wait for every worker to drain.
    ///
    /// Workers observe the flag within one dequeue timeout; any task already
    /// running finishes first. In-progress tasks are never cancelled.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<_> = {
            let mut guard = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!("Worker pool stopped");
    }
}

async fn run_worker(worker_id: usize, ctx: Arc<WorkerContext>, shutdown_rx: watch::Receiver<bool>) {
    tracing::debug!(worker_id, "Worker loop started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        match ctx.queue.dequeue(ctx.dequeue_timeout).await {
            Ok(Some(entry)) => process_entry(worker_id, &ctx, entry).await,
            Ok(None) => {
                // Empty window; loop to re-check the shutdown flag.
            }
            Err(e) => {
                tracing::error!(worker_id, error = %e, "Dequeue failed");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
    tracing::debug!(worker_id, "Worker loop stopped");
}

/// Run one dequeued entry to a terminal state.
///
/// Task failures are fully contained here: they are recorded on the job
/// record and surfaced through the webhook, never propagated out of the
/// worker loop.
async fn process_entry(worker_id: usize, ctx: &WorkerContext, entry: QueueEntry) {
    let job_id = entry.job_id.clone();
    tracing::info!(worker_id, job_id, task = %entry.task_name, "Processing job");

    let processing = match ctx
        .store
        .transition(&job_id, JobStatus::Processing, None, None)
        .await
    {
        Ok(record) => record,
        Err(e) => {
            // Nothing to run against: the record is gone or already moved
            // on (e.g. a lost entry redelivered by an operator).
            tracing::error!(worker_id, job_id, error = %e, "Could not mark job processing");
            return;
        }
    };

    let outcome = match ctx.registry.resolve(&entry.task_name) {
        Ok(task) => {
            let task_ctx = TaskContext {
                job_id: job_id.clone(),
                created_at: processing.created_at,
            };
            run_contained(task.run(task_ctx, &entry.arguments)).await
        }
        Err(e) => Err(TaskError::new(e.to_string())),
    };

    let (status, result, error) = match outcome {
        Ok(value) => {
            tracing::info!(worker_id, job_id, "Job completed");
            (JobStatus::Completed, Some(value), None)
        }
        Err(e) => {
            tracing::warn!(worker_id, job_id, error = %e, "Job failed");
            (JobStatus::Failed, None, Some(e.message().to_string()))
        }
    };

    if let Err(e) = ctx
        .store
        .transition(&job_id, status, result.clone(), error.clone())
        .await
    {
        tracing::error!(worker_id, job_id, error = %e, "Could not record terminal state");
        return;
    }

    if let Some(url) = webhook_url(&entry.arguments) {
        ctx.notifier.notify(&job_id, url, status, result, error).await;
    }
}

/// Execute the task body, converting a panic into a typed failure so a
/// misbehaving body cannot take down the worker.
async fn run_contained<F>(fut: F) -> Result<serde_json::Value, TaskError>
where
    F: std::future::Future<Output = Result<serde_json::Value, TaskError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "task panicked".to_string());
            Err(TaskError::new(format!("Task panicked: {message}")))
        }
    }
}

fn webhook_url(args: &TaskArgs) -> Option<&str> {
    args.get("webhook_url").and_then(|v| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::memory::InMemoryQueue;
    use crate::store::memory::InMemoryStatusStore;
    use crate::task::{Task, TaskResult};
    use async_trait::async_trait;

    struct PanickingTask;

    #[async_trait]
    impl Task for PanickingTask {
        async fn run(&self, _ctx: TaskContext, _args: &TaskArgs) -> TaskResult {
            panic!("overlay decode blew up");
        }
    }

    fn pool(queue: Arc<InMemoryQueue>, store: Arc<InMemoryStatusStore>, registry: Arc<TaskRegistry>) -> WorkerPool {
        WorkerPool::new(
            queue,
            store,
            registry,
            WebhookNotifier::new(1),
            Duration::from_millis(20),
        )
    }

    #[tokio::test]
    async fn panicking_task_becomes_failed_record() {
        let queue = Arc::new(InMemoryQueue::new(8));
        let store = Arc::new(InMemoryStatusStore::new());
        let registry = Arc::new(TaskRegistry::new());
        registry.register("boom", PanickingTask);

        store.create("j1", "boom", TaskArgs::new()).await.unwrap();
        queue
            .enqueue(QueueEntry {
                job_id: "j1".into(),
                task_name: "boom".into(),
                arguments: TaskArgs::new(),
            })
            .await
            .unwrap();

        let pool = pool(queue, store.clone(), registry);
        pool.start(1);

        let record = wait_terminal(&store, "j1").await;
        pool.shutdown().await;

        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error.unwrap().contains("overlay decode blew up"));
    }

    #[tokio::test]
    async fn unknown_task_becomes_failed_record() {
        let queue = Arc::new(InMemoryQueue::new(8));
        let store = Arc::new(InMemoryStatusStore::new());
        let registry = Arc::new(TaskRegistry::new());

        store.create("j1", "ghost", TaskArgs::new()).await.unwrap();
        queue
            .enqueue(QueueEntry {
                job_id: "j1".into(),
                task_name: "ghost".into(),
                arguments: TaskArgs::new(),
            })
            .await
            .unwrap();

        let pool = pool(queue, store.clone(), registry);
        pool.start(1);

        let record = wait_terminal(&store, "j1").await;
        pool.shutdown().await;

        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.error.unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn shutdown_with_empty_queue_is_prompt() {
        let queue = Arc::new(InMemoryQueue::new(8));
        let store = Arc::new(InMemoryStatusStore::new());
        let registry = Arc::new(TaskRegistry::new());

        let pool = pool(queue, store, registry);
        pool.start(4);

        let start = std::time::Instant::now();
        pool.shutdown().await;
        // Bounded by the dequeue timeout (20ms here), with slack for CI.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    async fn wait_terminal(store: &InMemoryStatusStore, job_id: &str) -> crate::job::JobRecord {
        for _ in 0..200 {
            if let Some(record) = store.get(job_id).await.unwrap() {
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached a terminal state");
    }
}
