use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes how fields of a predecessor step's output feed named
/// parameter slots of this step. `source_path` is a JSON-pointer-like
/// path such as `results[*].title`; `target_param` is the parameter
/// name it is written into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropagateFrom {
    pub from_step: usize,
    pub source_path: String,
    pub target_param: String,
}

/// One agent invocation with resolved parameters inside a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub agent: String,
    pub params: HashMap<String, Value>,
    pub depends_on: Vec<usize>,
    pub propagate_from: Vec<PropagateFrom>,
}

/// A DAG of steps produced by the Planner from a `ReasoningResult`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub steps: Vec<Step>,
}

impl ExecutionPlan {
    /// Walks `depends_on` edges and returns `true` iff the graph is a
    /// DAG, i.e. no step is reachable from itself.
    pub fn is_dag(&self) -> bool {
        for start in 0..self.steps.len() {
            let mut visited = vec![false; self.steps.len()];
            let mut stack = self.steps[start].depends_on.clone();
            while let Some(node) = stack.pop() {
                if node == start {
                    return false;
                }
                if visited[node] {
                    continue;
                }
                visited[node] = true;
                stack.extend(self.steps[node].depends_on.iter().copied());
            }
        }
        true
    }
}

/// Outcome of executing one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub agent: String,
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(depends_on: Vec<usize>) -> Step {
        Step {
            agent: "a".into(),
            params: HashMap::new(),
            depends_on,
            propagate_from: Vec::new(),
        }
    }

    #[test]
    fn linear_chain_is_a_dag() {
        let plan = ExecutionPlan {
            steps: vec![step(vec![]), step(vec![0]), step(vec![1])],
        };
        assert!(plan.is_dag());
    }

    #[test]
    fn self_reference_is_not_a_dag() {
        let plan = ExecutionPlan {
            steps: vec![step(vec![0])],
        };
        assert!(!plan.is_dag());
    }

    #[test]
    fn cycle_is_not_a_dag() {
        let plan = ExecutionPlan {
            steps: vec![step(vec![1]), step(vec![0])],
        };
        assert!(!plan.is_dag());
    }

    #[test]
    fn independent_steps_form_a_dag() {
        let plan = ExecutionPlan {
            steps: vec![step(vec![]), step(vec![])],
        };
        assert!(plan.is_dag());
    }
}
