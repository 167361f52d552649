use crate::job::TaskArgs;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::marker::PhantomData;

/// Context passed to task execution
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub job_id: String,
    pub created_at: DateTime<Utc>,
}

/// A typed task failure.
///
/// Task bodies report failure through this type rather than by unwinding;
/// the message is captured verbatim into the job record's `error` field.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type TaskResult = std::result::Result<serde_json::Value, TaskError>;

/// A task body: the opaque operation a job executes.
///
/// Receives named arguments and either returns a result value (typically a
/// URL string for the produced artifact) or a typed failure. The body is
/// expected to enforce its own execution timeout; the surrounding subsystem
/// applies none.
#[async_trait]
pub trait Task: Send + Sync + 'static {
    async fn run(&self, ctx: TaskContext, args: &TaskArgs) -> TaskResult;
}

impl std::fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Task")
    }
}

/// Adapter so a plain async closure can serve as a task body without a
/// dedicated struct.
///
/// ```ignore
/// registry.register("echo", FnTask::new(|_ctx, args: TaskArgs| async move {
///     Ok(serde_json::Value::Object(args))
/// }));
/// ```
pub struct FnTask<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

impl<F, Fut> FnTask<F, Fut>
where
    F: Fn(TaskContext, TaskArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F, Fut>
where
    F: Fn(TaskContext, TaskArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    async fn run(&self, ctx: TaskContext, args: &TaskArgs) -> TaskResult {
        (self.f)(ctx, args.clone()).await
    }
}
