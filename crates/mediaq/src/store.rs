use crate::error::{JobError, Result};
use crate::job::{JobRecord, JobStatus, TaskArgs};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod memory;

#[cfg(feature = "redis")]
pub mod redis;

/// Per-status record counts, as reported by [`StatusStore::counts_by_status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.queued + self.processing + self.completed + self.failed
    }

    pub(crate) fn bump(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}

/// The authoritative record of job lifecycle state.
///
/// Multiple workers update records concurrently; implementations must make
/// `create` and `transition` atomic read-modify-write operations.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Insert a new record in the `Queued` state.
    ///
    /// Fails with [`JobError::DuplicateJob`] if the id already exists.
    async fn create(&self, job_id: &str, task_name: &str, arguments: TaskArgs) -> Result<JobRecord>;

    async fn get(&self, job_id: &str) -> Result<Option<JobRecord>>;

    /// Move a record to `new_status`, updating `updated_at` and the terminal
    /// payload field in the same atomic step.
    ///
    /// Fails with [`JobError::NotFound`] if the record is absent and
    /// [`JobError::InvalidTransition`] if `new_status` is not reachable from
    /// the current state.
    async fn transition(
        &self,
        job_id: &str,
        new_status: JobStatus,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) -> Result<JobRecord>;

    /// Remove a record outright.
    ///
    /// Only used to roll back a submission whose enqueue was rejected, so a
    /// failed `submit` leaves no orphan record. Removing an absent record is
    /// not an error.
    async fn remove(&self, job_id: &str) -> Result<()>;

    /// Count records per lifecycle state.
    async fn counts_by_status(&self) -> Result<StatusCounts>;
}

/// Shared transition rules applied by every backend once it holds the
/// record exclusively.
pub(crate) fn apply_transition(
    record: &mut JobRecord,
    new_status: JobStatus,
    result: Option<serde_json::Value>,
    error: Option<String>,
) -> Result<()> {
    if !record.status.can_transition_to(new_status) {
        return Err(JobError::InvalidTransition {
            from: record.status,
            to: new_status,
        });
    }

    let now = chrono::Utc::now();
    record.status = new_status;
    record.updated_at = now;

    match new_status {
        JobStatus::Completed => {
            record.completed_at = Some(now);
            record.result = result;
        }
        JobStatus::Failed => {
            record.error = error;
        }
        JobStatus::Queued | JobStatus::Processing => {}
    }

    Ok(())
}
