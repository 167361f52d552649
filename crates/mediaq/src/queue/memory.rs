use super::QueueBackend;
use crate::error::{JobError, Result};
use crate::job::QueueEntry;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Bounded in-process FIFO queue (not persistent).
///
/// All queued and in-flight entries are lost on process restart. Waiting
/// consumers park on a [`Notify`] so `dequeue` blocks with a bounded wait
/// instead of busy-polling.
#[derive(Debug, Clone)]
pub struct InMemoryQueue {
    inner: Arc<Mutex<VecDeque<QueueEntry>>>,
    notify: Arc<Notify>,
    capacity: usize,
}

impl InMemoryQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            capacity,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VecDeque<QueueEntry>>> {
        self.inner
            .lock()
            .map_err(|_| JobError::Backend("Queue lock poisoned".to_string()))
    }
}

#[async_trait]
impl QueueBackend for InMemoryQueue {
    async fn enqueue(&self, entry: QueueEntry) -> Result<()> {
        {
            let mut queue = self.lock()?;
            if queue.len() >= self.capacity {
                return Err(JobError::QueueFull);
            }
            queue.push_back(entry);
        }
        // Wake at most one parked consumer per entry.
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<QueueEntry>> {
        let deadline = Instant::now() + timeout;
        loop {
            // Register for a wakeup before checking, so an enqueue between
            // the check and the await is not missed.
            let notified = self.notify.notified();

            if let Some(entry) = self.lock()?.pop_front() {
                return Ok(Some(entry));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
            // Woken: another consumer may have raced us to the entry, so
            // loop and re-check under the lock.
        }
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }
}
