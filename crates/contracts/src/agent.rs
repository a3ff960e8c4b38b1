use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an agent is reached. The registry stores the handle; the
/// executor is the only component that dereferences it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvocationHandle {
    /// Resolved in-process by name; the executor looks the callable
    /// up in its own registry of built-ins.
    InProcess { callable: String },
    /// A subprocess speaking newline-delimited JSON on stdio.
    Subprocess { command: String, args: Vec<String> },
    /// A remote agent reachable over JSON-over-HTTP.
    Http { url: String },
}

/// Static description of one agent, registered at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    pub capabilities: BTreeSet<String>,
    pub description: String,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub invocation_handle: InvocationHandle,
    pub is_privileged: bool,
    pub required_fields: Vec<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

impl AgentDescriptor {
    /// Normalizes capability tags to lowercase so the registry's
    /// capability index can do an exact-match lookup.
    pub fn normalized_capabilities(&self) -> BTreeSet<String> {
        self.capabilities.iter().map(|c| c.to_lowercase()).collect()
    }
}

/// Uniform request shape sent to any agent regardless of transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInvocationRequest {
    pub query: Option<String>,
    pub parameters: Value,
    pub context: Option<Value>,
}

/// Uniform response shape returned by any agent regardless of transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInvocationResponse {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub requires_approval: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_capabilities_lowercases() {
        let descriptor = AgentDescriptor {
            name: "Weather".into(),
            capabilities: BTreeSet::from(["Weather".to_string(), "FORECAST".to_string()]),
            description: "reports weather".into(),
            input_schema: None,
            output_schema: None,
            invocation_handle: InvocationHandle::InProcess {
                callable: "weather".into(),
            },
            is_privileged: false,
            required_fields: vec!["city".into()],
            timeout_ms: 5_000,
            max_retries: 2,
        };
        let normalized = descriptor.normalized_capabilities();
        assert!(normalized.contains("weather"));
        assert!(normalized.contains("forecast"));
    }
}
