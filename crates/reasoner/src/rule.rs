//! Rule strategy: a small table of `{pattern, action, confidence}`
//! entries loaded at startup. Patterns match tokenized, lowercased
//! query text; ties are broken by higher declared confidence, then by
//! earlier rule order.

use std::collections::HashMap;

use contracts::{ReasoningMethod, ReasoningResult};
use regex::Regex;
use serde_json::Value;

/// One agent entry within a rule's action, with a parameter extractor
/// applied to the raw query text at match time.
#[derive(Clone)]
pub struct AgentAction {
    pub agent: String,
    pub params: fn(&str) -> HashMap<String, Value>,
}

/// A single rule: matches when every keyword group has at least one
/// hit in the tokenized query (AND of ORs), selecting one or more
/// agents.
pub struct RuleEntry {
    pub name: &'static str,
    pub keyword_groups: Vec<Vec<&'static str>>,
    pub agents: Vec<AgentAction>,
    pub parallel: bool,
    pub confidence: f64,
}

pub struct RuleStrategy {
    pub rules: Vec<RuleEntry>,
    pub accept_threshold: f64,
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn matches(tokens: &[String], groups: &[Vec<&'static str>]) -> bool {
    groups.iter().all(|group| group.iter().any(|kw| tokens.iter().any(|t| t == kw)))
}

impl RuleStrategy {
    /// Evaluates every rule against the query text, keeping the
    /// highest-confidence match (ties broken by earlier rule order),
    /// and returns it only if it clears `accept_threshold`.
    pub fn evaluate(&self, text: &str) -> Option<ReasoningResult> {
        let tokens = tokenize(text);
        let mut best: Option<(usize, &RuleEntry)> = None;
        for (idx, rule) in self.rules.iter().enumerate() {
            if !matches(&tokens, &rule.keyword_groups) {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, current)) => rule.confidence > current.confidence,
            };
            if better {
                best = Some((idx, rule));
            }
        }

        let (_, rule) = best?;
        if rule.confidence < self.accept_threshold {
            return None;
        }

        let mut parameters = HashMap::new();
        let agents: Vec<String> = rule
            .agents
            .iter()
            .map(|action| {
                parameters.insert(action.agent.clone(), Value::Object(
                    (action.params)(text).into_iter().collect(),
                ));
                action.agent.clone()
            })
            .collect();

        Some(ReasoningResult {
            agents,
            parameters,
            parallel: rule.parallel,
            confidence: rule.confidence,
            method: ReasoningMethod::Rule,
            reasoning_text: format!("matched rule '{}'", rule.name),
            rejection_reason: None,
        })
    }
}

/// Extracts a city name following "in <City>" (stopping at "and" or
/// end of string). Used by the built-in weather rule.
pub fn extract_city_param(text: &str) -> HashMap<String, Value> {
    static CITY_RE: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
        Regex::new(r"(?i)\bin\s+([A-Za-z][A-Za-z\s]*?)(?:\s+and\b|[.?!]|$)").unwrap()
    });
    let mut params = HashMap::new();
    if let Some(caps) = CITY_RE.captures(text) {
        let city = caps.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        if !city.is_empty() {
            params.insert("city".to_string(), Value::String(city));
        }
    }
    params
}

/// Extracts the two operands of an addition expressed as `A + B` or
/// `A plus B`. Used by the built-in calculator rule.
pub fn extract_add_operands(text: &str) -> HashMap<String, Value> {
    static ADD_RE: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
        Regex::new(r"(-?\d+(?:\.\d+)?)\s*(?:\+|plus)\s*(-?\d+(?:\.\d+)?)").unwrap()
    });
    let mut params = HashMap::new();
    if let Some(caps) = ADD_RE.captures(text) {
        let a: f64 = caps[1].parse().unwrap_or(0.0);
        let b: f64 = caps[2].parse().unwrap_or(0.0);
        params.insert("op".to_string(), Value::String("add".to_string()));
        params.insert(
            "operands".to_string(),
            Value::Array(vec![
                serde_json::json!(a),
                serde_json::json!(b),
            ]),
        );
    }
    params
}

/// Extracts a free-text search query following "search" up to "and".
pub fn extract_search_query(text: &str) -> HashMap<String, Value> {
    static SEARCH_RE: once_cell::sync::Lazy<Regex> = once_cell::sync::Lazy::new(|| {
        Regex::new(r"(?i)search\s+(.+?)(?:\s+and\b|[.?!]|$)").unwrap()
    });
    let mut params = HashMap::new();
    if let Some(caps) = SEARCH_RE.captures(text) {
        let query = caps.get(1).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        if !query.is_empty() {
            params.insert("query".to_string(), Value::String(query));
        }
    }
    params
}

/// Static parameters for the data-processor "average ratings" rule.
pub fn average_rating_params(_text: &str) -> HashMap<String, Value> {
    let mut params = HashMap::new();
    params.insert("op".to_string(), Value::String("avg".to_string()));
    params.insert("field".to_string(), Value::String("rating".to_string()));
    params
}

/// The default rule table, covering the scenarios in the testable
/// properties: a standalone weather rule, a standalone calculator
/// rule, their parallel combination, and a sequential search +
/// data-processor combination.
pub fn default_rules() -> Vec<RuleEntry> {
    vec![
        RuleEntry {
            name: "weather_and_calculator",
            keyword_groups: vec![vec!["weather"], vec!["calculate", "calc"]],
            agents: vec![
                AgentAction { agent: "weather".into(), params: extract_city_param },
                AgentAction { agent: "calculator".into(), params: extract_add_operands },
            ],
            parallel: true,
            confidence: 0.95,
        },
        RuleEntry {
            name: "search_then_average",
            keyword_groups: vec![vec!["search"], vec!["average", "avg"]],
            agents: vec![
                AgentAction { agent: "search".into(), params: extract_search_query },
                AgentAction { agent: "data_processor".into(), params: average_rating_params },
            ],
            parallel: false,
            confidence: 0.9,
        },
        RuleEntry {
            name: "weather",
            keyword_groups: vec![vec!["weather", "forecast", "temperature"]],
            agents: vec![AgentAction { agent: "weather".into(), params: extract_city_param }],
            parallel: false,
            confidence: 0.85,
        },
        RuleEntry {
            name: "calculator",
            keyword_groups: vec![vec!["calculate", "calc"]],
            agents: vec![AgentAction { agent: "calculator".into(), params: extract_add_operands }],
            parallel: false,
            confidence: 0.85,
        },
        RuleEntry {
            name: "search",
            keyword_groups: vec![vec!["search", "find", "lookup"]],
            agents: vec![AgentAction { agent: "search".into(), params: extract_search_query }],
            parallel: false,
            confidence: 0.8,
        },
    ]
}
