use serde::{Deserialize, Serialize};

/// Role of a message in a generation request, matching the common
/// shape every provider adapter translates to and from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Request body accepted by `POST /v1/generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub messages: Vec<ChatMessage>,
    pub provider: Option<String>,
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    4096
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// Normalized response shape returned regardless of upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub content: String,
    pub model: String,
    pub provider: String,
    pub usage: TokenUsage,
    pub finish_reason: String,
    pub latency_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_response_round_trips() {
        let response = GenerationResponse {
            content: "hello".into(),
            model: "claude-3".into(),
            provider: "anthropic".into(),
            usage: TokenUsage::new(10, 20),
            finish_reason: "stop".into(),
            latency_ms: 123,
        };
        let json = serde_json::to_string(&response).unwrap();
        let back: GenerationResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(response.content, back.content);
        assert_eq!(response.usage, back.usage);
        assert_eq!(response.usage.total_tokens, 30);
    }
}
