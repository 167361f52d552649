use super::QueueBackend;
use crate::error::{JobError, Result};
use crate::job::QueueEntry;
use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio::time::Instant;

/// Redis-backed durable queue.
///
/// Entries are JSON objects pushed with `LPUSH` and popped with `RPOP`, so
/// order is FIFO per single consumer; across independent consumer processes
/// no ordering is guaranteed. Entries survive process restarts and may be
/// pulled by any number of consumer processes.
///
/// Delivery is at-most-once: there is no visibility timeout or lease, so a
/// worker that crashes after `RPOP` but before the terminal status
/// transition permanently loses the entry and leaves the record stuck in
/// `processing`. This mirrors the source system's behavior and is a known
/// reliability gap.
#[derive(Debug, Clone)]
pub struct RedisQueue {
    client: Client,
    queue_key: String,
    poll_interval: Duration,
}

impl RedisQueue {
    pub fn new(url: &str, namespace: &str, poll_interval: Duration) -> Result<Self> {
        let client = Client::open(url).map_err(|e| JobError::Config(e.to_string()))?;
        Ok(Self {
            client,
            queue_key: format!("{namespace}:queue"),
            poll_interval,
        })
    }

    async fn connection(&self) -> Result<redis::aio::Connection> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| JobError::Backend(e.to_string()))
    }

    async fn try_pop(&self) -> Result<Option<QueueEntry>> {
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .rpop(&self.queue_key, None)
            .await
            .map_err(|e| JobError::Backend(e.to_string()))?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl QueueBackend for RedisQueue {
    async fn enqueue(&self, entry: QueueEntry) -> Result<()> {
        let mut conn = self.connection().await?;
        let json = serde_json::to_string(&entry)?;
        // The durable backlog is treated as unbounded; no capacity check.
        conn.lpush::<_, _, ()>(&self.queue_key, json)
            .await
            .map_err(|e| JobError::Backend(e.to_string()))
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<QueueEntry>> {
        // Non-blocking poll with a fixed idle sleep rather than BRPOP, so
        // any number of consumer processes can share the backlog.
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(entry) = self.try_pop().await? {
                return Ok(Some(entry));
            }
            if Instant::now() + self.poll_interval > deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.connection().await?;
        let len: usize = conn
            .llen(&self.queue_key)
            .await
            .map_err(|e| JobError::Backend(e.to_string()))?;
        Ok(len)
    }
}
