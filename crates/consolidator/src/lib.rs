//! C9 Consolidator: merges a `ReasoningResult` and the executor's
//! per-step `StepResult`s into the final response body returned from
//! `POST /query`.
//!
//! Invariants (SPEC_FULL §4.9): `count = successful + failed`;
//! `agent_trail` is every step's agent name in temporal execution
//! order (`started_at`), including failed and cancelled steps;
//! `parallel` is true iff any two *successful* steps' time windows
//! overlapped.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use contracts::{ReasoningMethod, ReasoningResult, StepResult};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub agent: Option<String>,
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReasoningSummary {
    pub method: ReasoningMethod,
    pub confidence: f64,
    pub reasoning_text: String,
}

impl From<&ReasoningResult> for ReasoningSummary {
    fn from(reasoning: &ReasoningResult) -> Self {
        Self {
            method: reasoning.method,
            confidence: reasoning.confidence,
            reasoning_text: reasoning.reasoning_text.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Metadata {
    pub count: usize,
    pub successful: usize,
    pub failed: usize,
    pub agent_trail: Vec<String>,
    pub total_execution_time_ms: u64,
    pub max_execution_time_ms: u64,
    pub parallel: bool,
    pub reasoning: ReasoningSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsolidatedResponse {
    pub success: bool,
    pub data: HashMap<String, Value>,
    pub errors: Vec<ErrorEntry>,
    #[serde(rename = "_metadata")]
    pub metadata: Metadata,
}

/// Builds the final response for a query whose reasoning step
/// rejected it outright -- the executor never ran.
pub fn rejected(reasoning: &ReasoningResult) -> ConsolidatedResponse {
    let kind = match reasoning.rejection_reason.as_deref() {
        Some("account_specific") => "AccountSpecificRejected".to_string(),
        Some(other) => other.to_string(),
        None => "Rejected".to_string(),
    };
    ConsolidatedResponse {
        success: false,
        data: HashMap::new(),
        errors: vec![ErrorEntry {
            agent: None,
            kind,
            message: reasoning.reasoning_text.clone(),
        }],
        metadata: Metadata {
            count: 0,
            successful: 0,
            failed: 0,
            agent_trail: Vec::new(),
            total_execution_time_ms: 0,
            max_execution_time_ms: 0,
            parallel: false,
            reasoning: ReasoningSummary::from(reasoning),
        },
    }
}

/// Builds the final response from a completed (or partially failed)
/// execution plan.
pub fn consolidate(reasoning: &ReasoningResult, results: &[StepResult]) -> ConsolidatedResponse {
    if reasoning.method == ReasoningMethod::Reject {
        return rejected(reasoning);
    }

    let successful = results.iter().filter(|r| r.success).count();
    let failed = results.iter().filter(|r| !r.success).count();

    let mut ordered: Vec<&StepResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.started_at);
    let agent_trail: Vec<String> = ordered.iter().map(|r| r.agent.clone()).collect();

    let mut data = HashMap::new();
    let mut errors = Vec::new();
    for result in results {
        if result.success {
            if let Some(output) = &result.output {
                data.insert(result.agent.clone(), output.clone());
            }
        } else {
            errors.push(ErrorEntry {
                agent: Some(result.agent.clone()),
                kind: classify_error_kind(result.error.as_deref()),
                message: result.error.clone().unwrap_or_default(),
            });
        }
    }

    let total_execution_time_ms = span_ms(results);
    let max_execution_time_ms = results
        .iter()
        .map(|r| duration_ms(r.started_at, r.finished_at))
        .max()
        .unwrap_or(0);
    let parallel = successful_windows_overlap(results);

    ConsolidatedResponse {
        success: failed == 0,
        data,
        errors,
        metadata: Metadata {
            count: successful + failed,
            successful,
            failed,
            agent_trail,
            total_execution_time_ms,
            max_execution_time_ms,
            parallel,
            reasoning: ReasoningSummary::from(reasoning),
        },
    }
}

fn duration_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    (end - start).num_milliseconds().max(0) as u64
}

fn span_ms(results: &[StepResult]) -> u64 {
    let earliest = results.iter().map(|r| r.started_at).min();
    let latest = results.iter().map(|r| r.finished_at).max();
    match (earliest, latest) {
        (Some(start), Some(end)) => duration_ms(start, end),
        _ => 0,
    }
}

fn successful_windows_overlap(results: &[StepResult]) -> bool {
    let successful: Vec<&StepResult> = results.iter().filter(|r| r.success).collect();
    for i in 0..successful.len() {
        for other in &successful[i + 1..] {
            let a = successful[i];
            if a.started_at < other.finished_at && other.started_at < a.finished_at {
                return true;
            }
        }
    }
    false
}

/// Maps the executor's terminal error labels to a short machine-
/// readable kind, falling back to a generic bucket for agent-reported
/// failures.
fn classify_error_kind(error: Option<&str>) -> String {
    match error {
        Some("DeadlineExceeded") => "DeadlineExceeded".to_string(),
        Some("Cancelled") => "Cancelled".to_string(),
        Some("SkippedDueToUpstream") => "SkippedDueToUpstream".to_string(),
        Some(text) if text.contains("Hallucination") => "HallucinationDetected".to_string(),
        _ => "AgentError".to_string(),
    }
}
