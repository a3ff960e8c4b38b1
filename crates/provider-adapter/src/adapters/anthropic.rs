use std::time::Instant;

use async_trait::async_trait;
use contracts::{ChatMessage, GenerationResponse, MessageRole, TokenUsage};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{fold_system_messages, ProviderAdapter, ProviderCallFailed, ProviderHealth};

/// Thin `reqwest` client over Anthropic's Messages API.
pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
    default_model: String,
    base_url: String,
}

impl AnthropicAdapter {
    pub fn new(api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            base_url: "https://api.anthropic.com/v1".to_string(),
        }
    }

}

#[derive(Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<AnthropicContentBlock>,
    usage: AnthropicUsage,
    stop_reason: Option<String>,
}

#[async_trait]
impl ProviderAdapter for AnthropicAdapter {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<GenerationResponse, ProviderCallFailed> {
        let (system, rest) = fold_system_messages(messages);
        let anthropic_messages = rest
            .into_iter()
            .map(|m| AnthropicMessage {
                role: match m.role {
                    MessageRole::User | MessageRole::System => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: m.content,
            })
            .collect();

        let request = AnthropicRequest {
            model: model.unwrap_or(&self.default_model).to_string(),
            messages: anthropic_messages,
            max_tokens,
            temperature,
            system,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await
            .map_err(|e| transient_failure("anthropic", &e))?;

        let status = response.status();
        if !status.is_success() {
            let transient = status.is_server_error();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderCallFailed {
                provider: "anthropic".to_string(),
                cause: format!("http {status}: {body}"),
                transient,
            });
        }

        let parsed: AnthropicResponse = response.json().await.map_err(|e| ProviderCallFailed {
            provider: "anthropic".to_string(),
            cause: format!("malformed response body: {e}"),
            transient: false,
        })?;

        let latency_ms = started.elapsed().as_millis() as u64;
        let content = parsed
            .content
            .into_iter()
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(GenerationResponse {
            content,
            model: parsed.model,
            provider: "anthropic".to_string(),
            usage: TokenUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
            finish_reason: parsed.stop_reason.unwrap_or_else(|| "stop".to_string()),
            latency_ms,
        })
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        let ping = json!({
            "model": self.default_model,
            "messages": [{"role": "user", "content": "ping"}],
            "max_tokens": 1,
        });
        match self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&ping)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => ProviderHealth {
                healthy: true,
                latency_ms: started.elapsed().as_millis() as u64,
                error: None,
            },
            Ok(response) => ProviderHealth {
                healthy: false,
                latency_ms: started.elapsed().as_millis() as u64,
                error: Some(format!("http {}", response.status())),
            },
            Err(e) => ProviderHealth {
                healthy: false,
                latency_ms: started.elapsed().as_millis() as u64,
                error: Some(e.to_string()),
            },
        }
    }
}

fn transient_failure(provider: &str, err: &reqwest::Error) -> ProviderCallFailed {
    ProviderCallFailed {
        provider: provider.to_string(),
        cause: err.to_string(),
        transient: err.is_timeout() || err.is_connect(),
    }
}
