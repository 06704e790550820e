//! Task lifecycle types.
//!
//! # State Transition Diagram
//!
//! ```text
//! Task::new() → Pending ── assign/dequeue → InProgress ──┬── complete() → Completed
//!                  ↑                                     └── fail() ────→ Failed
//!                  └── requeued on capability mismatch
//! ```
//!
//! A task becomes terminal (Completed or Failed) exactly once and is never
//! reused after that.

use crate::TaskId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// TASK STATUS
// ============================================================================

/// Status of a task in the distribution lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting in the shared queue
    Pending,
    /// Claimed by a worker and executing
    InProgress,
    /// Finished successfully (terminal)
    Completed,
    /// Finished with an error (terminal)
    Failed,
}

impl TaskStatus {
    /// Convert to the wire string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" | "inprogress" | "in-progress" => Ok(TaskStatus::InProgress),
            "completed" | "complete" => Ok(TaskStatus::Completed),
            "failed" | "failure" => Ok(TaskStatus::Failed),
            _ => Err(TaskStatusParseError(s.to_string())),
        }
    }
}

/// Error when parsing an invalid task status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskStatusParseError(pub String);

impl fmt::Display for TaskStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid task status: {}", self.0)
    }
}

impl std::error::Error for TaskStatusParseError {}

// ============================================================================
// TASK
// ============================================================================

/// A unit of work distributed by the orchestrator.
///
/// Mutated only by the worker currently holding it and by the orchestrator
/// when recording assignment; single-owner by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task id
    pub id: TaskId,
    /// Task name; matched against worker capability names
    pub name: String,
    /// Work input
    pub payload: Value,
    /// Current lifecycle status
    pub status: TaskStatus,
    /// Worker this task was assigned to
    pub assigned_to: Option<String>,
    /// Work output, set on completion
    pub result: Option<Value>,
    /// Failure description, set on failure
    pub error: Option<String>,
}

impl Task {
    /// Create a new pending task.
    pub fn new(name: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            payload,
            status: TaskStatus::Pending,
            assigned_to: None,
            result: None,
            error: None,
        }
    }

    /// Mark the task completed with a result.
    pub fn complete(&mut self, result: Value) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
    }

    /// Mark the task failed with an error description.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
    }

    /// Check if the task has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
