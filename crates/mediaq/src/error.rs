use thiserror::Error;

use crate::job::JobStatus;

#[derive(Debug, Error)]
pub enum JobError {
    /// The bounded in-process queue is at capacity. Callers should apply
    /// backpressure (retry later) rather than treat this as a processing
    /// failure.
    #[error("Job queue is full")]
    QueueFull,

    #[error("Duplicate job id: {0}")]
    DuplicateJob(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Job serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, JobError>;
