//! Shared data model and error taxonomy for the agent router core.
//!
//! Every other crate in the workspace depends on this one; this crate
//! depends on nothing else in the workspace. Types here are the wire
//! format between the orchestrator, the gateway, and the audit trail,
//! so they derive `Serialize`/`Deserialize` and are expected to
//! round-trip losslessly.

pub mod agent;
pub mod audit;
pub mod breaker;
pub mod error;
pub mod generation;
pub mod plan;
pub mod query;
pub mod reasoning;
pub mod validation;

pub use agent::{AgentDescriptor, AgentInvocationRequest, AgentInvocationResponse};
pub use audit::{AuditEvent, AuditEventKind, AuditTrace, FinalSummary, TimingWindow};
pub use breaker::{CircuitBreakerState, CircuitStatus};
pub use error::{ProviderAttempt, ProviderOutcome, RouterError};
pub use generation::{
    ChatMessage, GenerateRequest, GenerationResponse, MessageRole, TokenUsage,
};
pub use plan::{ExecutionPlan, PropagateFrom, Step, StepResult};
pub use query::{Query, QueryOptions, ReasoningMode};
pub use reasoning::{ReasoningMethod, ReasoningResult};
pub use validation::ValidationVerdict;
