//! Provider Adapter (C1): a uniform call surface over one upstream
//! generation provider.
//!
//! Adapters are stateless beyond their connection/credentials handle
//! and are responsible for translating the common message shape into
//! the provider's native request, and for folding provider-specific
//! failures into a single `ProviderCallFailed` error kind.

pub mod adapters;

use async_trait::async_trait;
use contracts::{ChatMessage, GenerationResponse, MessageRole};

/// Health of a single provider, returned by `health_check`.
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

/// Error raised by an adapter; `transient` drives the retry policy in
/// `agent-router-resilience`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("provider '{provider}' call failed: {cause}")]
pub struct ProviderCallFailed {
    pub provider: String,
    pub cause: String,
    pub transient: bool,
}

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable provider name used in config, telemetry, and the
    /// normalized response's `provider` field.
    fn name(&self) -> &str;

    async fn generate(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<GenerationResponse, ProviderCallFailed>;

    async fn health_check(&self) -> ProviderHealth;
}

/// Folds `system` messages into the first `user` message for
/// providers (like the in-tree echo/bedrock adapters here) that lack
/// a dedicated system channel. Returns `(system_prefix, rest)`.
pub fn fold_system_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<ChatMessage>) {
    let mut system_parts = Vec::new();
    let mut rest = Vec::new();
    for message in messages {
        match message.role {
            MessageRole::System => system_parts.push(message.content.clone()),
            _ => rest.push(message.clone()),
        }
    }
    if system_parts.is_empty() {
        (None, rest)
    } else {
        (Some(system_parts.join("\n")), rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_system_messages_out() {
        let messages = vec![
            ChatMessage {
                role: MessageRole::System,
                content: "be terse".into(),
            },
            ChatMessage {
                role: MessageRole::User,
                content: "hello".into(),
            },
        ];
        let (system, rest) = fold_system_messages(&messages);
        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].role, MessageRole::User);
    }

    #[test]
    fn no_system_messages_yields_none() {
        let messages = vec![ChatMessage {
            role: MessageRole::User,
            content: "hello".into(),
        }];
        let (system, rest) = fold_system_messages(&messages);
        assert!(system.is_none());
        assert_eq!(rest.len(), 1);
    }
}
