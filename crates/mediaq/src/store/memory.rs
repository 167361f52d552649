use super::{apply_transition, StatusCounts, StatusStore};
use crate::error::{JobError, Result};
use crate::job::{JobRecord, JobStatus, TaskArgs};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-process status store (not persistent).
///
/// The map is shared by every worker in the pool, so all access goes through
/// a mutex; create and transition are read-modify-write under the same lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStatusStore {
    records: Arc<Mutex<HashMap<String, JobRecord>>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, JobRecord>>> {
        self.records
            .lock()
            .map_err(|_| JobError::Backend("Status store lock poisoned".to_string()))
    }
}

#[async_trait]
impl StatusStore for InMemoryStatusStore {
    async fn create(&self, job_id: &str, task_name: &str, arguments: TaskArgs) -> Result<JobRecord> {
        let mut records = self.lock()?;
        if records.contains_key(job_id) {
            return Err(JobError::DuplicateJob(job_id.to_string()));
        }
        let record = JobRecord::new(job_id, task_name, arguments);
        records.insert(job_id.to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        Ok(self.lock()?.get(job_id).cloned())
    }

    async fn transition(
        &self,
        job_id: &str,
        new_status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<JobRecord> {
        let mut records = self.lock()?;
        let record = records
            .get_mut(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;
        apply_transition(record, new_status, result, error)?;
        Ok(record.clone())
    }

    async fn remove(&self, job_id: &str) -> Result<()> {
        self.lock()?.remove(job_id);
        Ok(())
    }

    async fn counts_by_status(&self) -> Result<StatusCounts> {
        let records = self.lock()?;
        let mut counts = StatusCounts::default();
        for record in records.values() {
            counts.bump(record.status);
        }
        Ok(counts)
    }
}
