//! Capability and registration records for agent discovery.

use crate::{JsonMap, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// CAPABILITY
// ============================================================================

/// A named skill an agent advertises.
///
/// Immutable once attached to a registration. Constraints carry arbitrary
/// key/value requirements (e.g. `region: "us"`); metrics carry advertised
/// performance figures for capability-aware scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    /// Capability name; matched exactly by the dispatch path
    pub name: String,
    /// Advertised version of the capability
    pub version: String,
    /// Constraint key/value pairs used by discovery filtering
    pub constraints: JsonMap,
    /// Performance metrics advertised with the capability
    pub metrics: HashMap<String, f64>,
}

impl Capability {
    /// Create a new capability with no constraints or metrics.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            constraints: JsonMap::new(),
            metrics: HashMap::new(),
        }
    }

    /// Attach a constraint.
    pub fn with_constraint(mut self, key: impl Into<String>, value: Value) -> Self {
        self.constraints.insert(key.into(), value);
        self
    }

    /// Attach a performance metric.
    pub fn with_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    /// Superset match: every key/value pair in the query must equal this
    /// capability's own constraint value for that key.
    pub fn matches_constraints(&self, query: &JsonMap) -> bool {
        query
            .iter()
            .all(|(k, v)| self.constraints.get(k) == Some(v))
    }
}

// ============================================================================
// AGENT REGISTRATION
// ============================================================================

/// The record a registry holds per agent.
///
/// Replaced wholesale on re-registration with the same id. `last_heartbeat`
/// is refreshed by an external heartbeat mechanism through
/// [`AgentRegistration::heartbeat`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRegistration {
    /// Unique agent identifier (opaque string)
    pub agent_id: String,
    /// Capabilities advertised at registration time
    pub capabilities: Vec<Capability>,
    /// Opaque endpoint identifier
    pub endpoint: String,
    /// Derived health-check endpoint
    pub health_endpoint: String,
    /// When this registration was created
    pub registered_at: Timestamp,
    /// Last heartbeat timestamp
    pub last_heartbeat: Timestamp,
    /// Arbitrary registration metadata
    pub metadata: JsonMap,
}

impl AgentRegistration {
    /// Create a new registration. The health endpoint is derived from the
    /// endpoint; both timestamps are set to now.
    pub fn new(
        agent_id: impl Into<String>,
        capabilities: Vec<Capability>,
        endpoint: impl Into<String>,
        metadata: JsonMap,
    ) -> Self {
        let endpoint = endpoint.into();
        let now = Utc::now();
        Self {
            agent_id: agent_id.into(),
            capabilities,
            health_endpoint: format!("{}/health", endpoint),
            endpoint,
            registered_at: now,
            last_heartbeat: now,
            metadata,
        }
    }

    /// Check if this registration advertises a capability by name.
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name == name)
    }

    /// Capability-level OR: true if at least one capability superset-matches
    /// the query constraints.
    pub fn matches_constraints(&self, query: &JsonMap) -> bool {
        self.capabilities
            .iter()
            .any(|c| c.matches_constraints(query))
    }

    /// Refresh the heartbeat timestamp.
    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Utc::now();
    }
}
