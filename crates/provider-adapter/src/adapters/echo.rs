use async_trait::async_trait;
use contracts::{ChatMessage, GenerationResponse, TokenUsage};

use crate::{ProviderAdapter, ProviderCallFailed, ProviderHealth};

/// In-process adapter with no network dependency: echoes the last
/// user message back. Used in tests and for local development
/// without live provider credentials, mirroring the reference
/// implementation's own echo test harness.
pub struct EchoAdapter {
    fail_next: std::sync::atomic::AtomicBool,
}

impl Default for EchoAdapter {
    fn default() -> Self {
        Self {
            fail_next: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl EchoAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test hook: makes the next `generate` call return a transient
    /// failure, to exercise fallback/retry paths without a real
    /// flaky upstream.
    pub fn fail_next_call(&self) {
        self.fail_next
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl ProviderAdapter for EchoAdapter {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<GenerationResponse, ProviderCallFailed> {
        if self
            .fail_next
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(ProviderCallFailed {
                provider: "echo".to_string(),
                cause: "injected transient failure".to_string(),
                transient: true,
            });
        }

        let content = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        Ok(GenerationResponse {
            content: content.clone(),
            model: model.unwrap_or("echo-1").to_string(),
            provider: "echo".to_string(),
            usage: TokenUsage::new(content.len() as u32, content.len() as u32),
            finish_reason: "stop".to_string(),
            latency_ms: 0,
        })
    }

    async fn health_check(&self) -> ProviderHealth {
        ProviderHealth {
            healthy: true,
            latency_ms: 0,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::MessageRole;

    #[tokio::test]
    async fn echoes_last_user_message() {
        let adapter = EchoAdapter::new();
        let messages = vec![ChatMessage {
            role: MessageRole::User,
            content: "hello there".into(),
        }];
        let response = adapter.generate(&messages, None, 100, 0.0).await.unwrap();
        assert_eq!(response.content, "hello there");
        assert_eq!(response.provider, "echo");
    }

    #[tokio::test]
    async fn fail_next_call_injects_transient_error() {
        let adapter = EchoAdapter::new();
        adapter.fail_next_call();
        let messages = vec![ChatMessage {
            role: MessageRole::User,
            content: "hi".into(),
        }];
        let result = adapter.generate(&messages, None, 100, 0.0).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().transient);

        // The fault is one-shot.
        let result = adapter.generate(&messages, None, 100, 0.0).await;
        assert!(result.is_ok());
    }
}
