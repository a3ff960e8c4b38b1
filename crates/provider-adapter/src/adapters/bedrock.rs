use std::time::Instant;

use async_trait::async_trait;
use contracts::{ChatMessage, GenerationResponse, MessageRole, TokenUsage};
use serde::{Deserialize, Serialize};

use crate::{fold_system_messages, ProviderAdapter, ProviderCallFailed, ProviderHealth};

/// `reqwest` client over the Bedrock Converse API, reached through a
/// pre-signed runtime endpoint URL (the signing step itself is
/// delegated to the credentials handle baked into `runtime_url`).
pub struct BedrockAdapter {
    client: reqwest::Client,
    runtime_url: String,
    bearer_token: String,
    default_model_id: String,
}

impl BedrockAdapter {
    pub fn new(
        runtime_url: impl Into<String>,
        bearer_token: impl Into<String>,
        default_model_id: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            runtime_url: runtime_url.into(),
            bearer_token: bearer_token.into(),
            default_model_id: default_model_id.into(),
        }
    }
}

#[derive(Serialize)]
struct ConverseMessage {
    role: &'static str,
    content: Vec<ConverseContentBlock>,
}

#[derive(Serialize)]
struct ConverseContentBlock {
    text: String,
}

#[derive(Serialize)]
struct ConverseRequest {
    #[serde(rename = "modelId")]
    model_id: String,
    messages: Vec<ConverseMessage>,
    #[serde(rename = "inferenceConfig")]
    inference_config: InferenceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<Vec<ConverseContentBlock>>,
}

#[derive(Serialize)]
struct InferenceConfig {
    #[serde(rename = "maxTokens")]
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ConverseOutputMessage {
    content: Vec<ConverseResponseBlock>,
}

#[derive(Deserialize)]
struct ConverseResponseBlock {
    text: String,
}

#[derive(Deserialize)]
struct ConverseOutput {
    message: ConverseOutputMessage,
}

#[derive(Deserialize)]
struct ConverseUsage {
    #[serde(rename = "inputTokens")]
    input_tokens: u32,
    #[serde(rename = "outputTokens")]
    output_tokens: u32,
}

#[derive(Deserialize)]
struct ConverseResponse {
    output: ConverseOutput,
    usage: ConverseUsage,
    #[serde(rename = "stopReason")]
    stop_reason: Option<String>,
}

#[async_trait]
impl ProviderAdapter for BedrockAdapter {
    fn name(&self) -> &str {
        "bedrock"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<GenerationResponse, ProviderCallFailed> {
        let (system, rest) = fold_system_messages(messages);
        let converse_messages = rest
            .into_iter()
            .map(|m| ConverseMessage {
                role: match m.role {
                    MessageRole::User | MessageRole::System => "user",
                    MessageRole::Assistant => "assistant",
                },
                content: vec![ConverseContentBlock { text: m.content }],
            })
            .collect();

        let request = ConverseRequest {
            model_id: model.unwrap_or(&self.default_model_id).to_string(),
            messages: converse_messages,
            inference_config: InferenceConfig {
                max_tokens,
                temperature,
            },
            system: system.map(|s| vec![ConverseContentBlock { text: s }]),
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&self.runtime_url)
            .bearer_auth(&self.bearer_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderCallFailed {
                provider: "bedrock".to_string(),
                cause: e.to_string(),
                transient: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let transient = status.is_server_error();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderCallFailed {
                provider: "bedrock".to_string(),
                cause: format!("http {status}: {body}"),
                transient,
            });
        }

        let parsed: ConverseResponse = response.json().await.map_err(|e| ProviderCallFailed {
            provider: "bedrock".to_string(),
            cause: format!("malformed response body: {e}"),
            transient: false,
        })?;

        let latency_ms = started.elapsed().as_millis() as u64;
        let content = parsed
            .output
            .message
            .content
            .into_iter()
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");

        Ok(GenerationResponse {
            content,
            model: model.unwrap_or(&self.default_model_id).to_string(),
            provider: "bedrock".to_string(),
            usage: TokenUsage::new(parsed.usage.input_tokens, parsed.usage.output_tokens),
            finish_reason: parsed.stop_reason.unwrap_or_else(|| "stop".to_string()),
            latency_ms,
        })
    }

    async fn health_check(&self) -> ProviderHealth {
        let started = Instant::now();
        match self
            .client
            .get(format!("{}/ping", self.runtime_url.trim_end_matches('/')))
            .bearer_auth(&self.bearer_token)
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
