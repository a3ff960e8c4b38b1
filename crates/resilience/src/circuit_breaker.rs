//! Per-target circuit breaker state machine.
//!
//! States:
//! - CLOSED: calls pass through; failures accumulate.
//! - OPEN: calls are short-circuited until the cooldown elapses.
//! - HALF_OPEN: exactly one probe call is let through; its outcome
//!   decides whether the breaker closes or reopens.

use std::sync::Mutex;

use chrono::Utc;
use contracts::{CircuitBreakerState, CircuitStatus};
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub threshold: u32,
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            cooldown_ms: 30_000,
        }
    }
}

struct Inner {
    status: CircuitStatus,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    opened_at_wall: Option<chrono::DateTime<Utc>>,
    last_probe_at: Option<chrono::DateTime<Utc>>,
    half_open_probe_in_flight: bool,
}

/// A single target's breaker. `name` is only used for log lines; the
/// registry that owns many breakers keys on it separately.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

/// Whether a call may proceed right now, and if not, why.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Call is allowed through normally.
    Pass,
    /// Call is allowed through as the single half-open probe.
    Probe,
    /// Call must be rejected; breaker is open and cooldown has not elapsed.
    Reject,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                status: CircuitStatus::Closed,
                consecutive_failures: 0,
                opened_at: None,
                opened_at_wall: None,
                last_probe_at: None,
                half_open_probe_in_flight: false,
            }),
        }
    }

    /// Decides whether the caller may proceed, transitioning
    /// `open -> half_open` if the cooldown has elapsed.
    pub fn admit(&self) -> Admission {
        let mut inner = self.inner.lock().unwrap();
        match inner.status {
            CircuitStatus::Closed => Admission::Pass,
            CircuitStatus::HalfOpen => {
                if inner.half_open_probe_in_flight {
                    Admission::Reject
                } else {
                    inner.half_open_probe_in_flight = true;
                    inner.last_probe_at = Some(Utc::now());
                    Admission::Probe
                }
            }
            CircuitStatus::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|t| t.elapsed().as_millis() as u64)
                    .unwrap_or(u64::MAX);
                if elapsed >= self.config.cooldown_ms {
                    inner.status = CircuitStatus::HalfOpen;
                    inner.half_open_probe_in_flight = true;
                    inner.last_probe_at = Some(Utc::now());
                    info!(target = %self.name, "circuit breaker entering half_open probe");
                    Admission::Probe
                } else {
                    Admission::Reject
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures = 0;
        inner.half_open_probe_in_flight = false;
        if inner.status != CircuitStatus::Closed {
            inner.status = CircuitStatus::Closed;
            inner.opened_at = None;
            inner.opened_at_wall = None;
            info!(target = %self.name, "circuit breaker closed after successful probe");
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.half_open_probe_in_flight = false;
        match inner.status {
            CircuitStatus::HalfOpen => {
                inner.status = CircuitStatus::Open;
                inner.opened_at = Some(Instant::now());
                inner.opened_at_wall = Some(Utc::now());
                warn!(target = %self.name, "circuit breaker reopened: probe failed");
            }
            CircuitStatus::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.threshold {
                    inner.status = CircuitStatus::Open;
                    inner.opened_at = Some(Instant::now());
                    inner.opened_at_wall = Some(Utc::now());
                    warn!(
                        target = %self.name,
                        failures = inner.consecutive_failures,
                        "circuit breaker opened"
                    );
                }
            }
            CircuitStatus::Open => {}
        }
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        let inner = self.inner.lock().unwrap();
        CircuitBreakerState {
            status: inner.status,
            consecutive_failures: inner.consecutive_failures,
            opened_at: inner.opened_at_wall,
            last_probe_at: inner.last_probe_at,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
