//! Agent Registry (C4): catalog of agents, capabilities, descriptors,
//! and health.
//!
//! Reads go through an immutable snapshot pointer swapped on write
//! (`arc-swap`), so `find_by_capability`/`get`/`list` never block on a
//! concurrent `register`/`deregister`, mirroring the registry snapshot
//! pattern in §5 of the design notes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use arc_swap::ArcSwap;
use contracts::AgentDescriptor;
use tracing::info;

#[derive(Debug, Clone, Default)]
struct Snapshot {
    descriptors: HashMap<String, AgentDescriptor>,
    capability_index: BTreeMap<String, BTreeSet<String>>,
}

impl Snapshot {
    fn with_registered(&self, descriptor: AgentDescriptor) -> Self {
        let mut descriptors = self.descriptors.clone();
        descriptors.insert(descriptor.name.clone(), descriptor);
        Self {
            capability_index: build_index(&descriptors),
            descriptors,
        }
    }

    fn with_deregistered(&self, name: &str) -> Self {
        let mut descriptors = self.descriptors.clone();
        descriptors.remove(name);
        Self {
            capability_index: build_index(&descriptors),
            descriptors,
        }
    }
}

fn build_index(descriptors: &HashMap<String, AgentDescriptor>) -> BTreeMap<String, BTreeSet<String>> {
    let mut index: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for descriptor in descriptors.values() {
        for tag in descriptor.normalized_capabilities() {
            index.entry(tag).or_default().insert(descriptor.name.clone());
        }
    }
    index
}

/// Liveness of a registered agent as known to the registry itself
/// (live round-trip health is the executor's concern via C3's
/// breaker; this reflects registration state plus declared
/// privilege/timeout facts a caller may want before invoking).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHealth {
    pub registered: bool,
    pub is_privileged: bool,
    pub timeout_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("agent '{0}' is not registered")]
    NotFound(String),
    #[error("agent '{0}' is already registered")]
    AlreadyRegistered(String),
}

pub struct AgentRegistry {
    snapshot: ArcSwap<Snapshot>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
        }
    }

    pub fn register(&self, descriptor: AgentDescriptor) -> Result<(), RegistryError> {
        let current = self.snapshot.load();
        if current.descriptors.contains_key(&descriptor.name) {
            return Err(RegistryError::AlreadyRegistered(descriptor.name));
        }
        let name = descriptor.name.clone();
        let next = current.with_registered(descriptor);
        self.snapshot.store(Arc::new(next));
        info!(agent = %name, "agent registered");
        Ok(())
    }

    pub fn deregister(&self, name: &str) -> Result<(), RegistryError> {
        let current = self.snapshot.load();
        if !current.descriptors.contains_key(name) {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        let next = current.with_deregistered(name);
        self.snapshot.store(Arc::new(next));
        info!(agent = %name, "agent deregistered");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<AgentDescriptor> {
        self.snapshot.load().descriptors.get(name).cloned()
    }

    /// O(1) expected via the capability index snapshot; returns agent
    /// names in deterministic (lexical) order.
    pub fn find_by_capability(&self, tag: &str) -> Vec<String> {
        let tag = tag.to_lowercase();
        self.snapshot
            .load()
            .capability_index
            .get(&tag)
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn list(&self) -> Vec<AgentDescriptor> {
        self.snapshot.load().descriptors.values().cloned().collect()
    }

    pub fn health_of(&self, name: &str) -> AgentHealth {
        match self.snapshot.load().descriptors.get(name) {
            Some(descriptor) => AgentHealth {
                registered: true,
                is_privileged: descriptor.is_privileged,
                timeout_ms: descriptor.timeout_ms,
            },
            None => AgentHealth {
                registered: false,
                is_privileged: false,
                timeout_ms: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::InvocationHandle;

    fn descriptor(name: &str, capabilities: &[&str]) -> AgentDescriptor {
        AgentDescriptor {
            name: name.to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            description: format!("{name} agent"),
            input_schema: None,
            output_schema: None,
            invocation_handle: InvocationHandle::InProcess {
                callable: name.to_string(),
            },
            is_privileged: false,
            required_fields: Vec::new(),
            timeout_ms: 5_000,
            max_retries: 2,
        }
    }

    #[test]
    fn register_then_find_by_capability() {
        let registry = AgentRegistry::new();
        registry
            .register(descriptor("weather", &["Weather", "Forecast"]))
            .unwrap();
        assert_eq!(registry.find_by_capability("weather"), vec!["weather"]);
        assert_eq!(registry.find_by_capability("forecast"), vec!["weather"]);
        assert!(registry.find_by_capability("calculator").is_empty());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = AgentRegistry::new();
        registry.register(descriptor("weather", &["weather"])).unwrap();
        let err = registry
            .register(descriptor("weather", &["weather"]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
    }

    #[test]
    fn deregister_returns_to_prior_observable_state() {
        let registry = AgentRegistry::new();
        registry.register(descriptor("weather", &["weather"])).unwrap();
        let before = registry.list().len();
        registry.deregister("weather").unwrap();
        assert!(registry.get("weather").is_none());
        assert!(registry.find_by_capability("weather").is_empty());
        registry.register(descriptor("weather", &["weather"])).unwrap();
        assert_eq!(registry.list().len(), before);
    }

    #[test]
    fn deregister_unknown_agent_errors() {
        let registry = AgentRegistry::new();
        assert!(matches!(
            registry.deregister("ghost"),
            Err(RegistryError::NotFound(_))
        ));
    }

    #[test]
    fn health_of_reflects_registration() {
        let registry = AgentRegistry::new();
        assert!(!registry.health_of("weather").registered);
        registry.register(descriptor("weather", &["weather"])).unwrap();
        let health = registry.health_of("weather");
        assert!(health.registered);
        assert_eq!(health.timeout_ms, 5_000);
    }

    #[test]
    fn multiple_agents_share_a_capability_tag() {
        let registry = AgentRegistry::new();
        registry.register(descriptor("search_a", &["search"])).unwrap();
        registry.register(descriptor("search_b", &["search"])).unwrap();
        let mut found = registry.find_by_capability("search");
        found.sort();
        assert_eq!(found, vec!["search_a", "search_b"]);
    }
}
