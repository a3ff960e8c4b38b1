use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Event kinds recorded into a query's audit trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    QueryStart,
    ReasoningDecision,
    AgentInteraction,
    ToolInteraction,
    Validation,
    RetryAttempt,
    Error,
    QueryEnd,
}

/// One entry in the append-only per-query trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub kind: AuditEventKind,
    pub at: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingWindow {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub total_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalSummary {
    pub success: bool,
    pub agent_count: usize,
    pub agents_used: Vec<String>,
    pub error_count: usize,
}

/// The per-query append-only record of decisions, attempts, and
/// outcomes. Co-owned with the query's lifetime; released to the
/// Audit Logger at finalize and serialized exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrace {
    pub query_id: Uuid,
    pub timing: TimingWindow,
    pub reasoning: Option<Value>,
    pub steps: Vec<Value>,
    pub validations: Vec<Value>,
    pub retries: Vec<Value>,
    pub errors: Vec<Value>,
    pub final_summary: Option<FinalSummary>,
}

impl AuditTrace {
    pub fn open(query_id: Uuid, start: DateTime<Utc>) -> Self {
        Self {
            query_id,
            timing: TimingWindow {
                start,
                end: None,
                total_ms: None,
            },
            reasoning: None,
            steps: Vec::new(),
            validations: Vec::new(),
            retries: Vec::new(),
            errors: Vec::new(),
            final_summary: None,
        }
    }

    /// `true` once exactly one `QUERY_START` would have preceded
    /// exactly one `QUERY_END` -- callers derive this from the events
    /// list kept alongside the trace by the Audit Logger.
    pub fn is_closed(&self) -> bool {
        self.timing.end.is_some() && self.final_summary.is_some()
    }
}
