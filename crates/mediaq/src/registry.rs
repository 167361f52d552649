use crate::error::{JobError, Result};
use crate::task::Task;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Maps symbolic task names to the bodies that perform them.
///
/// Registration is additive and last-write-wins. It is intended to happen
/// once at process startup; resolution happens on every dequeue, so lookups
/// take a read lock only.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, Arc<dyn Task>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Task>(&self, name: impl Into<String>, task: T) {
        self.register_arc(name, Arc::new(task));
    }

    pub fn register_arc(&self, name: impl Into<String>, task: Arc<dyn Task>) {
        let name = name.into();
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        if tasks.insert(name.clone(), task).is_some() {
            tracing::warn!(task = %name, "Task registration replaced an existing body");
        }
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Task>> {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        tasks
            .get(name)
            .cloned()
            .ok_or_else(|| JobError::UnknownTask(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tasks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
