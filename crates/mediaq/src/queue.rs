use crate::error::Result;
use crate::job::QueueEntry;
use async_trait::async_trait;
use std::time::Duration;

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

/// FIFO delivery of pending job descriptors from producers to workers.
///
/// Implementations must be safe for concurrent multi-producer,
/// multi-consumer use. Ordering is FIFO relative to enqueue order for a
/// single consumer; across a pool of workers, completion order is not
/// guaranteed to match submission order.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Push an entry onto the queue.
    ///
    /// The bounded in-process backend fails with [`crate::JobError::QueueFull`]
    /// at capacity; the durable backend is treated as unbounded.
    async fn enqueue(&self, entry: QueueEntry) -> Result<()>;

    /// Pop the next entry, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `Ok(None)` when the queue stayed empty for the whole window,
    /// which is how worker loops get a bounded opportunity to observe the
    /// shutdown signal.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<QueueEntry>>;

    /// Number of entries currently queued.
    async fn len(&self) -> Result<usize>;
}
