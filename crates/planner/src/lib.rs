//! Planner (C6): transforms a `ReasoningResult` into an
//! `ExecutionPlan`, a DAG of steps with resolved parameters and
//! propagation descriptors between dependent steps.

use std::collections::{HashMap, HashSet};

use contracts::{ExecutionPlan, PropagateFrom, ReasoningResult, RouterError, Step};
use registry::AgentRegistry;
use serde_json::Value;

/// A known (producer agent, consumer agent) propagation: which output
/// path of the producer feeds which parameter of the consumer, when
/// the two appear back-to-back in a sequential plan.
struct PropagationRule {
    source_path: &'static str,
    target_param: &'static str,
}

pub struct Planner {
    propagation_rules: HashMap<(&'static str, &'static str), Vec<PropagationRule>>,
}

impl Default for Planner {
    fn default() -> Self {
        let mut propagation_rules: HashMap<(&'static str, &'static str), Vec<PropagationRule>> =
            HashMap::new();
        propagation_rules.insert(
            ("search", "data_processor"),
            vec![PropagationRule { source_path: "results[*].rating", target_param: "values" }],
        );
        Self { propagation_rules }
    }
}

fn value_to_map(value: Option<&Value>) -> HashMap<String, Value> {
    match value {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => HashMap::new(),
    }
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan(
        &self,
        reasoning: &ReasoningResult,
        registry: &AgentRegistry,
    ) -> Result<ExecutionPlan, RouterError> {
        if reasoning.agents.is_empty() {
            return Err(RouterError::NoRouteFound);
        }

        let mut steps = Vec::with_capacity(reasoning.agents.len());
        for (idx, agent) in reasoning.agents.iter().enumerate() {
            let params = value_to_map(reasoning.parameters.get(agent));
            let mut depends_on = Vec::new();
            let mut propagate_from = Vec::new();

            if !reasoning.parallel && idx > 0 {
                depends_on.push(idx - 1);
                let prev_agent = reasoning.agents[idx - 1].as_str();
                if let Some(rules) = self.propagation_rules.get(&(prev_agent, agent.as_str())) {
                    propagate_from = rules
                        .iter()
                        .map(|rule| PropagateFrom {
                            from_step: idx - 1,
                            source_path: rule.source_path.to_string(),
                            target_param: rule.target_param.to_string(),
                        })
                        .collect();
                }
            }

            steps.push(Step { agent: agent.clone(), params, depends_on, propagate_from });
        }

        for (idx, step) in steps.iter().enumerate() {
            let Some(descriptor) = registry.get(&step.agent) else { continue };
            let covered: HashSet<&str> =
                step.propagate_from.iter().map(|p| p.target_param.as_str()).collect();
            for field in &descriptor.required_fields {
                if !step.params.contains_key(field) && !covered.contains(field.as_str()) {
                    return Err(RouterError::MissingParam { step: idx, field: field.clone() });
                }
            }
        }

        let plan = ExecutionPlan { steps };
        if !plan.is_dag() {
            return Err(RouterError::PlanCycle);
        }
        Ok(plan)
    }
}
