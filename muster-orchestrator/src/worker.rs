//! Capability-tagged worker handles.

use async_trait::async_trait;
use muster_core::{Task, TaskStatus};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// External execution contract supplied by the collaborator that owns the
/// real work.
///
/// Success yields the result payload; failure yields a description. The
/// worker records either outcome into the task; implementations must not
/// panic across this boundary.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Perform the work for one task. May suspend arbitrarily long.
    async fn run(&self, task: &Task) -> Result<Value, String>;
}

/// A worker agent that executes tasks one at a time.
pub struct Worker {
    id: String,
    capabilities: HashSet<String>,
    /// Busy flag: non-empty only while execution is in flight.
    current_task: Mutex<Option<Task>>,
    handler: Arc<dyn TaskHandler>,
}

impl Worker {
    /// Create a worker with an id, its capability names, and the handler
    /// that performs the actual work.
    pub fn new(
        id: impl Into<String>,
        capabilities: impl IntoIterator<Item = impl Into<String>>,
        handler: Arc<dyn TaskHandler>,
    ) -> Self {
        Self {
            id: id.into(),
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            current_task: Mutex::new(None),
            handler,
        }
    }

    /// Worker identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Capability names this worker advertises.
    pub fn capabilities(&self) -> &HashSet<String> {
        &self.capabilities
    }

    /// Dispatch-path matching rule: exact string match of the task name
    /// against the capability set. Checked by the dispatch loop, not by
    /// `execute`.
    pub fn can_handle(&self, task: &Task) -> bool {
        self.capabilities.contains(&task.name)
    }

    /// Whether execution is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.lock_current().is_some()
    }

    /// Snapshot of the task currently in flight, if any.
    pub fn current_task(&self) -> Option<Task> {
        self.lock_current().clone()
    }

    /// Execute a task to completion or failure.
    ///
    /// Sets the task in progress, marks this worker busy, runs the handler,
    /// and records the outcome into the task. Handler failure is captured as
    /// `Failed` with the error description; it never propagates. The busy
    /// flag is cleared on every exit path.
    pub async fn execute(&self, mut task: Task) -> Task {
        debug!(worker_id = %self.id, task_id = %task.id, name = %task.name, "executing task");
        task.status = TaskStatus::InProgress;
        *self.lock_current() = Some(task.clone());

        match self.handler.run(&task).await {
            Ok(result) => task.complete(result),
            Err(reason) => task.fail(reason),
        }

        *self.lock_current() = None;
        debug!(worker_id = %self.id, task_id = %task.id, status = %task.status, "task finished");
        task
    }

    /// The flag can only be poisoned if a dispatch loop panicked while
    /// holding it; the stale value is safe to reuse.
    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<Task>> {
        self.current_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("capabilities", &self.capabilities)
            .field("busy", &self.is_busy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        async fn run(&self, task: &Task) -> Result<Value, String> {
            Ok(json!({ "echo": task.payload }))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl TaskHandler for AlwaysFails {
        async fn run(&self, _task: &Task) -> Result<Value, String> {
            Err("simulated failure".to_string())
        }
    }

    #[tokio::test]
    async fn test_execute_success() {
        let worker = Worker::new("w-1", ["research"], Arc::new(Echo));
        let task = Task::new("research", json!({"q": 1}));

        let done = worker.execute(task).await;

        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.result, Some(json!({"echo": {"q": 1}})));
        assert!(done.error.is_none());
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn test_execute_failure_is_captured() {
        let worker = Worker::new("w-1", ["research"], Arc::new(AlwaysFails));
        let task = Task::new("research", json!(null));

        let done = worker.execute(task).await;

        assert_eq!(done.status, TaskStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("simulated failure"));
        assert!(done.result.is_none());
        // Busy flag released on the failure path too.
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn test_busy_flag_set_during_execution() {
        struct Probe {
            worker: std::sync::OnceLock<Arc<Worker>>,
        }

        #[async_trait]
        impl TaskHandler for Probe {
            async fn run(&self, task: &Task) -> Result<Value, String> {
                let worker = self.worker.get().expect("probe wired");
                assert!(worker.is_busy());
                let current = worker.current_task().expect("current task set");
                assert_eq!(current.id, task.id);
                assert_eq!(current.status, TaskStatus::InProgress);
                Ok(json!(null))
            }
        }

        let probe = Arc::new(Probe {
            worker: std::sync::OnceLock::new(),
        });
        let worker = Arc::new(Worker::new("w-1", ["research"], probe.clone() as Arc<dyn TaskHandler>));
        probe.worker.set(worker.clone()).ok();

        let done = worker.execute(Task::new("research", json!(null))).await;
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(!worker.is_busy());
    }

    #[test]
    fn test_can_handle_exact_match_only() {
        let worker = Worker::new("w-1", ["research", "web_search"], Arc::new(Echo));
        assert!(worker.can_handle(&Task::new("research", json!(null))));
        assert!(!worker.can_handle(&Task::new("Research", json!(null))));
        assert!(!worker.can_handle(&Task::new("analysis", json!(null))));
    }
}
