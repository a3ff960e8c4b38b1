use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Circuit breaker state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitStatus {
    Closed,
    Open,
    HalfOpen,
}

/// Observable snapshot of one target's breaker. Owned exclusively by
/// the retry/breaker component; every other component only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub status: CircuitStatus,
    pub consecutive_failures: u32,
    pub opened_at: Option<DateTime<Utc>>,
    pub last_probe_at: Option<DateTime<Utc>>,
}

impl CircuitBreakerState {
    pub fn closed() -> Self {
        Self {
            status: CircuitStatus::Closed,
            consecutive_failures: 0,
            opened_at: None,
            last_probe_at: None,
        }
    }
}
