use std::path::PathBuf;
use std::time::Duration;

/// Static configuration for the queue/worker subsystem.
///
/// Supplied once at process start; nothing here is renegotiated at runtime.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// Number of concurrent worker loops.
    pub workers: usize,
    /// Capacity of the bounded in-process queue.
    pub queue_capacity: usize,
    /// How long a worker blocks on an empty queue before re-checking the
    /// shutdown signal. Bounds shutdown latency.
    pub dequeue_timeout: Duration,
    /// Webhook delivery attempt budget.
    pub webhook_max_retries: u32,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 100,
            dequeue_timeout: Duration::from_secs(1),
            webhook_max_retries: 3,
        }
    }
}

impl JobsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    pub fn dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }

    pub fn webhook_max_retries(mut self, n: u32) -> Self {
        self.webhook_max_retries = n;
        self
    }
}

/// One managed directory with its age threshold.
#[derive(Debug, Clone)]
pub struct EvictionRoot {
    pub path: PathBuf,
    pub max_age: Duration,
}

/// Configuration for the background eviction loop.
#[derive(Debug, Clone)]
pub struct EvictionConfig {
    pub interval: Duration,
    pub roots: Vec<EvictionRoot>,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            roots: Vec::new(),
        }
    }
}

impl EvictionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Add a managed directory with its own age threshold.
    pub fn root(mut self, path: impl Into<PathBuf>, max_age: Duration) -> Self {
        self.roots.push(EvictionRoot {
            path: path.into(),
            max_age,
        });
        self
    }
}
