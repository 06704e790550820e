//! MUSTER Registry - Agent Discovery
//!
//! In-memory directory mapping agent identifiers to capability sets.
//! Supports registration (insert-or-replace, last write wins) and
//! capability-based discovery with optional constraint filtering.
//!
//! The registry is internally synchronized so it can be shared via `Arc`
//! between the orchestrator and other callers. There is no deregistration
//! or expiry; both are left to an external collaborator.

use muster_core::{
    AgentRegistration, Capability, JsonMap, MusterResult, RegistryError,
};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info};

/// Mutable registry state, guarded by one lock so the directory and the
/// capability index never diverge.
#[derive(Debug, Default)]
struct RegistryInner {
    /// Registrations by agent id
    agents: HashMap<String, AgentRegistration>,
    /// Capability name → agent ids, in index insertion order
    capability_index: HashMap<String, Vec<String>>,
}

/// Central registry for agent discovery.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    inner: RwLock<RegistryInner>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent with its capabilities.
    ///
    /// Inserts or replaces the registration for `agent_id` wholesale; a
    /// re-registration removes the agent's previous index entries so
    /// discovery reflects only the latest capability set. Idempotent per
    /// agent id (last write wins).
    pub fn register(
        &self,
        agent_id: impl Into<String>,
        capabilities: Vec<Capability>,
        endpoint: impl Into<String>,
        metadata: JsonMap,
    ) -> MusterResult<()> {
        let agent_id = agent_id.into();
        let registration =
            AgentRegistration::new(agent_id.clone(), capabilities, endpoint, metadata);

        let mut inner = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;

        // Drop index entries from any previous registration of this id.
        if inner.agents.contains_key(&agent_id) {
            for ids in inner.capability_index.values_mut() {
                ids.retain(|id| id != &agent_id);
            }
        }

        for capability in &registration.capabilities {
            let ids = inner
                .capability_index
                .entry(capability.name.clone())
                .or_default();
            if !ids.contains(&agent_id) {
                ids.push(agent_id.clone());
            }
        }

        info!(
            agent_id = %agent_id,
            capabilities = ?registration
                .capabilities
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>(),
            "registered agent"
        );

        inner.agents.insert(agent_id, registration);
        Ok(())
    }

    /// Discover agents by capability name.
    ///
    /// Returns registrations in index insertion order. Unknown ids left in
    /// the index are silently skipped. If `constraints` is given, only
    /// registrations with at least one capability whose constraint map
    /// superset-matches the query are kept (capability-level OR).
    pub fn discover(
        &self,
        capability: &str,
        constraints: Option<&JsonMap>,
    ) -> MusterResult<Vec<AgentRegistration>> {
        let inner = self.inner.read().map_err(|_| RegistryError::LockPoisoned)?;

        let Some(agent_ids) = inner.capability_index.get(capability) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<AgentRegistration> = agent_ids
            .iter()
            .filter_map(|id| inner.agents.get(id))
            .cloned()
            .collect();

        if let Some(query) = constraints {
            matches.retain(|registration| registration.matches_constraints(query));
        }

        debug!(
            capability = capability,
            found = matches.len(),
            "discovery query"
        );
        Ok(matches)
    }

    /// Refresh an agent's heartbeat timestamp. Returns whether the agent
    /// was known to the registry.
    pub fn heartbeat(&self, agent_id: &str) -> MusterResult<bool> {
        let mut inner = self.inner.write().map_err(|_| RegistryError::LockPoisoned)?;
        match inner.agents.get_mut(agent_id) {
            Some(registration) => {
                registration.heartbeat();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Look up a registration by agent id.
    pub fn get(&self, agent_id: &str) -> MusterResult<Option<AgentRegistration>> {
        let inner = self.inner.read().map_err(|_| RegistryError::LockPoisoned)?;
        Ok(inner.agents.get(agent_id).cloned())
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.inner.read().map(|inner| inner.agents.len()).unwrap_or(0)
    }

    /// Whether the registry holds no registrations.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muster_core::MusterError;
    use proptest::prelude::*;
    use serde_json::json;

    fn caps(names: &[&str]) -> Vec<Capability> {
        names.iter().map(|n| Capability::new(*n, "1.0")).collect()
    }

    #[test]
    fn test_register_and_discover() -> MusterResult<()> {
        let registry = AgentRegistry::new();
        registry.register(
            "researcher-001",
            caps(&["research", "web_search"]),
            "worker://researcher-001",
            JsonMap::new(),
        )?;

        let found = registry.discover("research", None)?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent_id, "researcher-001");

        assert!(registry.discover("reporting", None)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_registration_idempotent_last_write_wins() -> MusterResult<()> {
        let registry = AgentRegistry::new();
        registry.register(
            "agent-1",
            caps(&["research"]),
            "worker://agent-1",
            JsonMap::new(),
        )?;
        registry.register(
            "agent-1",
            caps(&["analysis"]),
            "worker://agent-1",
            JsonMap::new(),
        )?;

        assert_eq!(registry.len(), 1);
        // Discovery reflects only the latest capability set.
        assert!(registry.discover("research", None)?.is_empty());
        let found = registry.discover("analysis", None)?;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent_id, "agent-1");
        Ok(())
    }

    #[test]
    fn test_discovery_no_duplicates_for_repeated_capability() -> MusterResult<()> {
        let registry = AgentRegistry::new();
        // Two capability entries with the same name on one agent.
        registry.register(
            "agent-1",
            vec![
                Capability::new("research", "1.0"),
                Capability::new("research", "2.0"),
            ],
            "worker://agent-1",
            JsonMap::new(),
        )?;

        let found = registry.discover("research", None)?;
        assert_eq!(found.len(), 1);
        Ok(())
    }

    #[test]
    fn test_discovery_insertion_order() -> MusterResult<()> {
        let registry = AgentRegistry::new();
        for id in ["a", "b", "c"] {
            registry.register(id, caps(&["research"]), format!("worker://{id}"), JsonMap::new())?;
        }

        let found = registry.discover("research", None)?;
        let ids: Vec<&str> = found.iter().map(|r| r.agent_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        Ok(())
    }

    #[test]
    fn test_constraint_filtering() -> MusterResult<()> {
        let registry = AgentRegistry::new();
        registry.register(
            "us-worker",
            vec![Capability::new("research", "1.0").with_constraint("region", json!("us"))],
            "worker://us-worker",
            JsonMap::new(),
        )?;

        let mut us = JsonMap::new();
        us.insert("region".to_string(), json!("us"));
        let found = registry.discover("research", Some(&us))?;
        assert_eq!(found.len(), 1);

        let mut eu = JsonMap::new();
        eu.insert("region".to_string(), json!("eu"));
        assert!(registry.discover("research", Some(&eu))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_heartbeat_known_and_unknown() -> MusterResult<()> {
        let registry = AgentRegistry::new();
        registry.register("agent-1", caps(&["research"]), "worker://agent-1", JsonMap::new())?;

        assert!(registry.heartbeat("agent-1")?);
        assert!(!registry.heartbeat("ghost")?);
        Ok(())
    }

    #[test]
    fn test_get_returns_registration() -> MusterResult<()> {
        let registry = AgentRegistry::new();
        registry.register("agent-1", caps(&["research"]), "ep", JsonMap::new())?;

        let reg = registry.get("agent-1")?.expect("registered agent");
        assert_eq!(reg.endpoint, "ep");
        assert!(registry.get("ghost")?.is_none());
        Ok(())
    }

    proptest! {
        /// Discovery completeness: for any assignment of capability subsets
        /// to agents, `discover(c)` returns exactly the agents holding `c`,
        /// with no duplicates and none missing.
        #[test]
        fn prop_discovery_completeness(assignment in proptest::collection::btree_map(
            "agent-[a-z]{3}",
            proptest::collection::btree_set(prop_oneof![
                Just("research".to_string()),
                Just("analysis".to_string()),
                Just("reporting".to_string()),
                Just("translation".to_string()),
            ], 0..4),
            0..8,
        )) {
            let registry = AgentRegistry::new();
            for (agent_id, names) in &assignment {
                let capabilities = names
                    .iter()
                    .map(|n| Capability::new(n.clone(), "1.0"))
                    .collect();
                registry
                    .register(agent_id.clone(), capabilities, format!("worker://{agent_id}"), JsonMap::new())
                    .map_err(|e: MusterError| TestCaseError::fail(e.to_string()))?;
            }

            for capability in ["research", "analysis", "reporting", "translation"] {
                let mut found: Vec<String> = registry
                    .discover(capability, None)
                    .map_err(|e| TestCaseError::fail(e.to_string()))?
                    .into_iter()
                    .map(|r| r.agent_id)
                    .collect();
                let mut expected: Vec<String> = assignment
                    .iter()
                    .filter(|(_, names)| names.contains(capability))
                    .map(|(id, _)| id.clone())
                    .collect();
                found.sort();
                expected.sort();
                prop_assert_eq!(found, expected);
            }
        }
    }
}
