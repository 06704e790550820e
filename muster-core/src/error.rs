//! Error types for MUSTER operations

use crate::TaskId;
use thiserror::Error;

/// Agent registry errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry lock poisoned")]
    LockPoisoned,
}

/// Message bus errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    #[error("Subscriber on topic {topic} failed: {reason}")]
    SubscriberFailed { topic: String, reason: String },

    #[error("Queue for topic {topic} is closed")]
    QueueClosed { topic: String },

    #[error("Bus lock poisoned")]
    LockPoisoned,
}

/// Orchestration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("No workers in the pool")]
    NoWorkers,

    #[error("Workers cannot be added while a workflow is active")]
    WorkflowInProgress,

    #[error("Task {task_id} is unroutable: no worker advertises capability {name}")]
    Unroutable { task_id: TaskId, name: String },

    #[error("Orchestrator lock poisoned")]
    LockPoisoned,
}

/// Master error type for all MUSTER errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MusterError {
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),
}

/// Result type alias for MUSTER operations.
pub type MusterResult<T> = Result<T, MusterError>;

// =============================================================================
// TESTS
// =============================================================================
