//! Asynchronous job queue and worker subsystem for media processing services.
//!
//! Long-running media transformation requests are accepted without blocking
//! the request path: a producer creates a job record (status `queued`) and
//! pushes a descriptor onto a queue backend; a pool of workers dequeues,
//! runs the registered task body, records the terminal state, and delivers
//! an optional webhook notification. A background eviction service deletes
//! aged artifacts independently of job tracking.
//!
//! Two deployment modes share the same contracts:
//! - in-process: bounded channel queue + mutex-guarded status map, losing
//!   all queued work on restart;
//! - durable (`redis` feature): Redis list queue + JSON records under
//!   namespaced keys, shared by any number of worker processes, at-most-once
//!   delivery.

pub mod config;
pub mod error;
pub mod eviction;
pub mod job;
pub mod queue;
pub mod registry;
pub mod service;
pub mod store;
pub mod task;
pub mod webhook;
pub mod worker;

pub use config::{EvictionConfig, EvictionRoot, JobsConfig};
pub use error::{JobError, Result};
pub use eviction::{EvictionReport, EvictionService};
pub use job::{generate_job_id, JobRecord, JobStatus, QueueEntry, TaskArgs};
pub use queue::memory::InMemoryQueue;
pub use queue::QueueBackend;
pub use registry::TaskRegistry;
pub use service::{JobService, QueueStats};
pub use store::memory::InMemoryStatusStore;
pub use store::{StatusCounts, StatusStore};
pub use task::{FnTask, Task, TaskContext, TaskError, TaskResult};
pub use webhook::{JobNotification, WebhookNotifier};
pub use worker::WorkerPool;

#[cfg(feature = "redis")]
pub use queue::redis::RedisQueue;
#[cfg(feature = "redis")]
pub use store::redis::RedisStatusStore;
