//! Hierarchical orchestrator: shared queue + one dispatch loop per worker.

use crate::worker::Worker;
use muster_core::{
    Capability, JsonMap, Message, MusterResult, OrchestrationError, Task,
};
use muster_bus::MessageBus;
use muster_registry::AgentRegistry;
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Topic for task-assignment lifecycle events.
pub const TOPIC_TASK_ASSIGNED: &str = "task.assigned";
/// Topic for task-completion lifecycle events.
pub const TOPIC_TASK_COMPLETED: &str = "task.completed";

/// Source/destination name the orchestrator uses on the bus.
const ORCHESTRATOR_NAME: &str = "orchestrator";

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Tuning knobs for the dispatch loops.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Bounded wait per dequeue attempt; also the stop-signal observation
    /// interval for idle loops.
    pub poll_timeout: Duration,
    /// Yield after a capability mismatch so other loops get a chance to
    /// claim the requeued task.
    pub mismatch_backoff: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(100),
            mismatch_backoff: Duration::from_millis(10),
        }
    }
}

// ============================================================================
// WORKFLOW STATE
// ============================================================================

/// State shared by the dispatch loops of one workflow run.
struct WorkflowState {
    /// Tail of the shared task queue (also used for requeueing).
    queue_tx: UnboundedSender<Task>,
    /// Head of the shared task queue; one claimant at a time.
    queue_rx: tokio::sync::Mutex<UnboundedReceiver<Task>>,
    /// Terminal tasks in completion order.
    results: Mutex<Vec<Task>>,
    /// Tasks not yet terminal; zero means quiescence.
    pending: AtomicUsize,
    /// Woken when `pending` reaches zero.
    done: Notify,
}

impl WorkflowState {
    /// Record a terminal task and signal quiescence on the last one.
    ///
    /// Exactly one loop records a given task, so the counter is decremented
    /// exactly once per task.
    fn record_terminal(&self, task: Task) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.done.notify_one();
        }
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Manager agent that delegates a task batch to a pool of workers.
///
/// Owns the shared task queue and the results list. Each registered worker
/// gets one concurrent dispatch loop; capability mismatches requeue the task
/// at the tail, tasks nobody in the pool can serve are rejected as
/// unroutable, and completion is detected by a pending counter rather than
/// polling for an empty queue.
pub struct HierarchicalOrchestrator {
    registry: Arc<AgentRegistry>,
    bus: Arc<MessageBus>,
    config: OrchestratorConfig,
    workers: RwLock<Vec<Arc<Worker>>>,
    workflow_active: AtomicBool,
}

impl HierarchicalOrchestrator {
    /// Create an orchestrator over a registry and a message bus.
    pub fn new(registry: Arc<AgentRegistry>, bus: Arc<MessageBus>) -> Self {
        Self::with_config(registry, bus, OrchestratorConfig::default())
    }

    /// Create an orchestrator with explicit tuning.
    pub fn with_config(
        registry: Arc<AgentRegistry>,
        bus: Arc<MessageBus>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            bus,
            config,
            workers: RwLock::new(Vec::new()),
            workflow_active: AtomicBool::new(false),
        }
    }

    /// Add a worker to the pool and register its capabilities in the
    /// registry under a synthetic `worker://{id}` endpoint.
    ///
    /// The pool is frozen while a workflow is active; adding a worker then
    /// is an error.
    pub fn add_worker(&self, worker: Arc<Worker>) -> MusterResult<()> {
        if self.workflow_active.load(Ordering::Acquire) {
            return Err(OrchestrationError::WorkflowInProgress.into());
        }

        let capabilities: Vec<Capability> = worker
            .capabilities()
            .iter()
            .map(|name| Capability::new(name.clone(), "1.0"))
            .collect();
        self.registry.register(
            worker.id(),
            capabilities,
            format!("worker://{}", worker.id()),
            JsonMap::new(),
        )?;

        self.workers
            .write()
            .map_err(|_| OrchestrationError::LockPoisoned)?
            .push(worker);
        Ok(())
    }

    /// Number of workers in the pool.
    pub fn worker_count(&self) -> usize {
        self.workers.read().map(|w| w.len()).unwrap_or(0)
    }

    /// Execute a workflow by distributing tasks across the worker pool.
    ///
    /// Enqueues all tasks in order, runs one dispatch loop per worker until
    /// every task is terminal, then stops the loops and returns the terminal
    /// tasks in completion order. A task's `status` field is the per-task
    /// success signal; a failed task never aborts the workflow.
    pub async fn execute_workflow(&self, tasks: Vec<Task>) -> MusterResult<Vec<Task>> {
        let pool: Arc<Vec<Arc<Worker>>> = Arc::new(
            self.workers
                .read()
                .map_err(|_| OrchestrationError::LockPoisoned)?
                .clone(),
        );
        if pool.is_empty() {
            return Err(OrchestrationError::NoWorkers.into());
        }
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        info!(tasks = tasks.len(), workers = pool.len(), "starting workflow");
        self.workflow_active.store(true, Ordering::Release);

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let state = Arc::new(WorkflowState {
            queue_tx,
            queue_rx: tokio::sync::Mutex::new(queue_rx),
            results: Mutex::new(Vec::new()),
            pending: AtomicUsize::new(tasks.len()),
            done: Notify::new(),
        });

        // The receiver lives in `state`, so these sends cannot fail.
        for task in tasks {
            let _ = state.queue_tx.send(task);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut loops = Vec::with_capacity(pool.len());
        for worker in pool.iter() {
            loops.push(tokio::spawn(dispatch_loop(
                Arc::clone(worker),
                Arc::clone(&pool),
                Arc::clone(&state),
                Arc::clone(&self.bus),
                self.config.clone(),
                stop_rx.clone(),
            )));
        }

        // Quiescence: every task terminal. The permit is created before the
        // counter check so a decrement between check and await cannot be
        // missed.
        loop {
            let notified = state.done.notified();
            if state.pending.load(Ordering::Acquire) == 0 {
                break;
            }
            notified.await;
        }

        // Cooperative stop: each loop observes the signal at its next
        // timeout tick. In-flight publishes finish before the join returns.
        let _ = stop_tx.send(true);
        for handle in loops {
            if let Err(error) = handle.await {
                warn!(%error, "dispatch loop terminated abnormally");
            }
        }

        self.workflow_active.store(false, Ordering::Release);

        let results = std::mem::take(
            &mut *state
                .results
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        info!(completed = results.len(), "workflow finished");
        Ok(results)
    }
}

// ============================================================================
// DISPATCH LOOP
// ============================================================================

/// Per-worker processing loop.
///
/// Claims tasks with a bounded wait, executes capability matches, requeues
/// mismatches some other pool member can serve, and rejects tasks nobody
/// can. The stop signal is observed only at a timeout tick, so a claimed
/// task is always driven to a terminal state.
async fn dispatch_loop(
    worker: Arc<Worker>,
    pool: Arc<Vec<Arc<Worker>>>,
    state: Arc<WorkflowState>,
    bus: Arc<MessageBus>,
    config: OrchestratorConfig,
    stop: watch::Receiver<bool>,
) {
    loop {
        let claimed = {
            let mut queue = state.queue_rx.lock().await;
            timeout(config.poll_timeout, queue.recv()).await
        };

        let mut task = match claimed {
            // Timeout tick: the loop's only cancellation-observation point.
            Err(_) => {
                if *stop.borrow() {
                    debug!(worker_id = %worker.id(), "dispatch loop stopping");
                    break;
                }
                continue;
            }
            // All senders dropped; nothing left to claim.
            Ok(None) => break,
            Ok(Some(task)) => task,
        };

        if worker.can_handle(&task) {
            task.assigned_to = Some(worker.id().to_string());

            let assigned = Message::event(
                ORCHESTRATOR_NAME,
                worker.id(),
                json!({ "task_id": task.id, "worker_id": worker.id() }),
            );
            if let Err(error) = bus.publish(TOPIC_TASK_ASSIGNED, assigned).await {
                warn!(%error, task_id = %task.id, "failed to publish assignment event");
            }

            let done = worker.execute(task).await;

            let completed = Message::event(
                worker.id(),
                ORCHESTRATOR_NAME,
                json!({ "task_id": done.id, "status": done.status.as_str() }),
            );
            if let Err(error) = bus.publish(TOPIC_TASK_COMPLETED, completed).await {
                warn!(%error, task_id = %done.id, "failed to publish completion event");
            }

            state.record_terminal(done);
        } else if pool.iter().any(|member| member.can_handle(&task)) {
            // Another worker can serve it: back to the tail, then yield so
            // that worker gets a chance to claim it.
            debug!(
                worker_id = %worker.id(),
                task_id = %task.id,
                name = %task.name,
                "capability mismatch; requeueing"
            );
            if state.queue_tx.send(task).is_err() {
                break;
            }
            tokio::time::sleep(config.mismatch_backoff).await;
        } else {
            // Reject-unroutable: the pool is frozen for the workflow, so no
            // amount of requeueing would ever find a capable worker.
            let reason = OrchestrationError::Unroutable {
                task_id: task.id,
                name: task.name.clone(),
            };
            warn!(task_id = %task.id, name = %task.name, "rejecting unroutable task");
            task.fail(reason.to_string());
            state.record_terminal(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.poll_timeout, Duration::from_millis(100));
        assert_eq!(config.mismatch_backoff, Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_workflow_rejects_empty_pool() {
        let orchestrator = HierarchicalOrchestrator::new(
            Arc::new(AgentRegistry::new()),
            Arc::new(MessageBus::new()),
        );
        let result = orchestrator
            .execute_workflow(vec![Task::new("research", json!(null))])
            .await;
        assert!(matches!(
            result,
            Err(muster_core::MusterError::Orchestration(
                OrchestrationError::NoWorkers
            ))
        ));
    }
}
