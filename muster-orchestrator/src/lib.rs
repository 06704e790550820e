//! MUSTER Orchestrator - Hierarchical Task Distribution
//!
//! Distributes a batch of tasks across a pool of capability-tagged workers.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │               HierarchicalOrchestrator                   │
//! │  shared queue ── one dispatch loop per worker            │
//! │       │                 │                                │
//! │       │   claim → capability check → execute → record    │
//! │       │                 │                                │
//! │       └── requeue on mismatch / reject unroutable        │
//! │                                                          │
//! │  events: task.assigned / task.completed  → MessageBus    │
//! │  capabilities registered  → AgentRegistry                │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Workers wrap an external [`TaskHandler`]; execution failure is always
//! captured into the task, never propagated. Workflow completion is signaled
//! by a pending counter rather than polling, and tasks no worker can ever
//! serve are rejected as unroutable instead of requeuing forever.

pub mod orchestrator;
pub mod worker;

pub use orchestrator::{
    HierarchicalOrchestrator, OrchestratorConfig, TOPIC_TASK_ASSIGNED, TOPIC_TASK_COMPLETED,
};
pub use worker::{TaskHandler, Worker};

// Re-export core types for convenience
pub use muster_core::{Message, MessageType, MusterResult, Task, TaskStatus};
