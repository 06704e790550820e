//! MUSTER Core - Entity Types
//!
//! Pure data structures with no behavior. All other crates depend on this.
//! This crate contains ONLY data types - no coordination logic.
//!
//! # Key Types
//!
//! - [`Capability`]: a named skill an agent advertises, with version,
//!   constraints, and performance metrics
//! - [`AgentRegistration`]: the record a registry holds per agent
//! - [`Message`]: the envelope carried by the message bus
//! - [`Task`]: a unit of work distributed by the orchestrator
//! - [`MusterError`] / [`MusterResult`]: the error taxonomy

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod capability;
pub mod error;
pub mod message;
pub mod task;

pub use capability::{AgentRegistration, Capability};
pub use error::{
    BusError, MusterError, MusterResult, OrchestrationError, RegistryError,
};
pub use message::{Message, MessageType, MessageTypeParseError};
pub use task::{Task, TaskStatus, TaskStatusParseError};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Message identifier using UUIDv7 for timestamp-sortable IDs.
pub type MessageId = Uuid;

/// Task identifier using UUIDv7 for timestamp-sortable IDs.
pub type TaskId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// String-keyed JSON map used for payloads, constraints, metadata, and
/// headers. Agent ids, topics, and endpoints stay opaque `String`s.
pub type JsonMap = std::collections::HashMap<String, serde_json::Value>;
