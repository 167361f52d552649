use super::{apply_transition, StatusCounts, StatusStore};
use crate::error::{JobError, Result};
use crate::job::{JobRecord, JobStatus, TaskArgs};
use async_trait::async_trait;
use redis::{AsyncCommands, Client};

/// Redis-backed status store.
///
/// Each record is a self-contained JSON value under `{ns}:job:{job_id}`.
/// Transition atomicity relies on a single writer owning the record at any
/// point of the lifecycle: the producer writes it once at create time, and
/// after dequeue exactly one worker owns the entry and performs both
/// transitions. No application-level locking is applied.
#[derive(Debug, Clone)]
pub struct RedisStatusStore {
    client: Client,
    namespace: String,
}

impl RedisStatusStore {
    pub fn new(url: &str, namespace: &str) -> Result<Self> {
        let client = Client::open(url).map_err(|e| JobError::Config(e.to_string()))?;
        Ok(Self {
            client,
            namespace: namespace.to_string(),
        })
    }

    fn job_key(&self, job_id: &str) -> String {
        format!("{}:job:{}", self.namespace, job_id)
    }

    async fn connection(&self) -> Result<redis::aio::Connection> {
        self.client
            .get_async_connection()
            .await
            .map_err(|e| JobError::Backend(e.to_string()))
    }

    async fn load(&self, conn: &mut redis::aio::Connection, job_id: &str) -> Result<Option<JobRecord>> {
        let raw: Option<String> = conn
            .get(self.job_key(job_id))
            .await
            .map_err(|e| JobError::Backend(e.to_string()))?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, conn: &mut redis::aio::Connection, record: &JobRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        conn.set::<_, _, ()>(self.job_key(&record.job_id), json)
            .await
            .map_err(|e| JobError::Backend(e.to_string()))
    }
}

#[async_trait]
impl StatusStore for RedisStatusStore {
    async fn create(&self, job_id: &str, task_name: &str, arguments: TaskArgs) -> Result<JobRecord> {
        let mut conn = self.connection().await?;
        let record = JobRecord::new(job_id, task_name, arguments);
        let json = serde_json::to_string(&record)?;

        // SET NX so a concurrent producer reusing the id loses cleanly.
        let created: bool = redis::cmd("SET")
            .arg(self.job_key(job_id))
            .arg(json)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| JobError::Backend(e.to_string()))?;

        if !created {
            return Err(JobError::DuplicateJob(job_id.to_string()));
        }
        Ok(record)
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let mut conn = self.connection().await?;
        self.load(&mut conn, job_id).await
    }

    async fn transition(
        &self,
        job_id: &str,
        new_status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<JobRecord> {
        let mut conn = self.connection().await?;
        let mut record = self
            .load(&mut conn, job_id)
            .await?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        apply_transition(&mut record, new_status, result, error)?;
        self.save(&mut conn, &record).await?;
        Ok(record)
    }

    async fn remove(&self, job_id: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.job_key(job_id))
            .await
            .map_err(|e| JobError::Backend(e.to_string()))
    }

    async fn counts_by_status(&self) -> Result<StatusCounts> {
        let mut conn = self.connection().await?;
        let pattern = format!("{}:job:*", self.namespace);

        let mut keys = Vec::new();
        {
            let mut iter: redis::AsyncIter<String> = conn
                .scan_match(pattern)
                .await
                .map_err(|e| JobError::Backend(e.to_string()))?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut counts = StatusCounts::default();
        for key in keys {
            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| JobError::Backend(e.to_string()))?;
            if let Some(json) = raw {
                if let Ok(record) = serde_json::from_str::<JobRecord>(&json) {
                    counts.bump(record.status);
                }
            }
        }
        Ok(counts)
    }
}
