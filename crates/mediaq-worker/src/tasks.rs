use mediaq::{FnTask, TaskArgs, TaskRegistry};

/// Register the task bodies this worker can execute.
///
/// Deployments wire their real media task bodies (transcode, caption,
/// extract-audio, ...) here; they only need to implement [`mediaq::Task`]
/// and enforce their own execution timeouts. `echo` ships as a smoke-test
/// task that reflects its arguments back as the result.
pub fn register_builtin(registry: &TaskRegistry) {
    registry.register(
        "echo",
        FnTask::new(|_ctx, args: TaskArgs| async move { Ok(serde_json::Value::Object(args)) }),
    );
    tracing::info!(tasks = registry.len(), "Task registry initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_tasks_resolve() {
        let registry = TaskRegistry::new();
        register_builtin(&registry);
        assert!(registry.resolve("echo").is_ok());
    }
}
