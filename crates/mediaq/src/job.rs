use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named arguments passed to a task at execution time. Opaque to the queue.
pub type TaskArgs = serde_json::Map<String, serde_json::Value>;

/// Lifecycle state of a job.
///
/// Transitions are monotonic and single-directional:
/// `Queued -> Processing -> Completed | Failed`. Terminal states are never
/// left and never revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `target` is reachable from this state.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        matches!(
            (self, target),
            (Self::Queued, JobStatus::Processing)
                | (Self::Processing, JobStatus::Completed)
                | (Self::Processing, JobStatus::Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tracked record of one unit of asynchronous work.
///
/// Created by the producer at submission time, mutated exactly twice by a
/// worker (queued -> processing, processing -> terminal), never deleted by
/// this subsystem. `result` and `error` are mutually exclusive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub task_name: String,
    pub status: JobStatus,
    pub arguments: TaskArgs,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    /// A fresh record in the `Queued` state.
    pub fn new(job_id: impl Into<String>, task_name: impl Into<String>, arguments: TaskArgs) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            task_name: task_name.into(),
            status: JobStatus::Queued,
            arguments,
            created_at: now,
            updated_at: now,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    /// The webhook callback URL, when one was supplied with the arguments.
    pub fn webhook_url(&self) -> Option<&str> {
        self.arguments.get("webhook_url").and_then(|v| v.as_str())
    }
}

/// Generate an opaque unique job identifier.
pub fn generate_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A transient descriptor of pending work.
///
/// Exists only between enqueue and dequeue; ownership transfers to the
/// dequeuing worker. This is also the durable backend's wire format, one
/// JSON object per entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub job_id: String,
    pub task_name: String,
    pub arguments: TaskArgs,
}
