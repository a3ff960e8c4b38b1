use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single provider attempt within a gateway call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderOutcome {
    Ok,
    Error,
}

/// One entry in a `GatewayCall`'s attempt log. Appended in the order
/// attempts were made; the fallback loop never reorders this list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderAttempt {
    pub provider_name: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub outcome: ProviderOutcome,
    pub error_kind: Option<String>,
    pub latency_ms: u64,
}

/// The full error taxonomy shared by the orchestrator and the
/// gateway. Every fallible operation in the workspace returns (or
/// converts into) this type; `http_status` is how the HTTP surface
/// (C13) turns one into a response code.
#[derive(Debug, thiserror::Error, Clone, Serialize, Deserialize)]
pub enum RouterError {
    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("no agent could be selected for this query")]
    NoRouteFound,

    #[error("query refers to the caller's own account and was rejected: {reason}")]
    AccountSpecificRejected { reason: String },

    #[error("execution plan is missing required parameter '{field}' at step {step}")]
    MissingParam { step: usize, field: String },

    #[error("execution plan contains a dependency cycle")]
    PlanCycle,

    #[error("circuit breaker for '{target}' is open")]
    BreakerOpen { target: String },

    #[error("transient failure calling {target}: {cause}")]
    Transient { target: String, cause: String },

    #[error("permanent failure calling {target}: {cause}")]
    Permanent { target: String, cause: String },

    #[error("validator flagged a hallucination (confidence {confidence})")]
    HallucinationDetected { confidence: f64 },

    #[error("operation was cancelled")]
    Cancelled,

    #[error("query deadline exceeded")]
    DeadlineExceeded,

    #[error("all providers failed: {attempts:?}")]
    AllProvidersFailed { attempts: Vec<ProviderAttempt> },

    #[error("internal error: {0}")]
    Internal(String),
}

impl RouterError {
    /// HTTP status code the API surface maps this error kind to.
    pub fn http_status(&self) -> u16 {
        match self {
            RouterError::BadRequest(_) => 400,
            RouterError::NoRouteFound | RouterError::AllProvidersFailed { .. } => 503,
            RouterError::AccountSpecificRejected { .. } => 200,
            RouterError::DeadlineExceeded => 408,
            _ => 500,
        }
    }

    /// The short, stable error-kind label surfaced in API responses
    /// (never the `Display` message, which may embed internals).
    pub fn kind(&self) -> &'static str {
        match self {
            RouterError::BadRequest(_) => "BadRequest",
            RouterError::NoRouteFound => "NoRouteFound",
            RouterError::AccountSpecificRejected { .. } => "AccountSpecificRejected",
            RouterError::MissingParam { .. } => "MissingParam",
            RouterError::PlanCycle => "PlanCycle",
            RouterError::BreakerOpen { .. } => "BreakerOpen",
            RouterError::Transient { .. } => "Transient",
            RouterError::Permanent { .. } => "Permanent",
            RouterError::HallucinationDetected { .. } => "HallucinationDetected",
            RouterError::Cancelled => "Cancelled",
            RouterError::DeadlineExceeded => "DeadlineExceeded",
            RouterError::AllProvidersFailed { .. } => "AllProvidersFailed",
            RouterError::Internal(_) => "Internal",
        }
    }

    /// Transient errors (and an elapsed-cooldown breaker probe) are
    /// retryable; everything else fails the attempt immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, RouterError::Transient { .. })
    }
}
