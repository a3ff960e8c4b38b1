use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which strategy produced a `ReasoningResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningMethod {
    Rule,
    Ai,
    Hybrid,
    Reject,
}

/// Output of the Reasoner (C5), consumed by the Planner (C6).
///
/// Invariant: `method == Reject` if and only if `agents` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningResult {
    pub agents: Vec<String>,
    pub parameters: HashMap<String, Value>,
    pub parallel: bool,
    pub confidence: f64,
    pub method: ReasoningMethod,
    pub reasoning_text: String,
    pub rejection_reason: Option<String>,
}

impl ReasoningResult {
    pub fn reject(reason: impl Into<String>, reasoning_text: impl Into<String>) -> Self {
        Self {
            agents: Vec::new(),
            parameters: HashMap::new(),
            parallel: false,
            confidence: 1.0,
            method: ReasoningMethod::Reject,
            reasoning_text: reasoning_text.into(),
            rejection_reason: Some(reason.into()),
        }
    }

    /// True when this result upholds the `reject <=> no agents` invariant.
    pub fn is_well_formed(&self) -> bool {
        (self.method == ReasoningMethod::Reject) == self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_has_no_agents() {
        let result = ReasoningResult::reject("account_specific", "matched possessive + balance");
        assert!(result.is_well_formed());
        assert!(result.agents.is_empty());
    }

    #[test]
    fn non_reject_with_agents_is_well_formed() {
        let result = ReasoningResult {
            agents: vec!["weather".into()],
            parameters: HashMap::new(),
            parallel: false,
            confidence: 0.9,
            method: ReasoningMethod::Rule,
            reasoning_text: "matched weather pattern".into(),
            rejection_reason: None,
        };
        assert!(result.is_well_formed());
    }

    #[test]
    fn reject_with_agents_is_malformed() {
        let result = ReasoningResult {
            agents: vec!["weather".into()],
            parameters: HashMap::new(),
            parallel: false,
            confidence: 0.9,
            method: ReasoningMethod::Reject,
            reasoning_text: "broken".into(),
            rejection_reason: Some("x".into()),
        };
        assert!(!result.is_well_formed());
    }
}
