use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reasoning strategy requested by the caller, or left for the
/// reasoner's configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningMode {
    Rule,
    Ai,
    Hybrid,
}

/// Per-query overrides accepted on `POST /query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryOptions {
    pub reasoning_mode: Option<ReasoningMode>,
    pub max_parallel: Option<usize>,
    pub deadline_ms: Option<u64>,
}

/// A user query, created at ingress and immutable thereafter.
///
/// The `id` is referenced by every audit event produced while the
/// query is in flight, so it must be assigned before any other
/// component sees the query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: Uuid,
    pub text: String,
    pub session_id: Option<String>,
    pub received_at: DateTime<Utc>,
    pub options: QueryOptions,
}

impl Query {
    pub fn new(text: impl Into<String>, session_id: Option<String>, options: QueryOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            session_id,
            received_at: Utc::now(),
            options,
        }
    }
}
