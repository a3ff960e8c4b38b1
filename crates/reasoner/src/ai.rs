//! AI strategy: composes a prompt from the query and the registry's
//! descriptor summaries, sends it through the gateway, and parses the
//! response as a `ReasoningResult`. Any parse or schema failure yields
//! no result rather than propagating an error — the caller (hybrid
//! mode) falls through to rejection.

use std::collections::HashMap;

use contracts::{ChatMessage, GenerateRequest, MessageRole, ReasoningMethod, ReasoningResult};
use gateway::Gateway;
use registry::AgentRegistry;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

pub struct AiStrategy {
    pub system_prompt_preamble: String,
}

impl Default for AiStrategy {
    fn default() -> Self {
        Self {
            system_prompt_preamble: "You are an agent router. Given the user's query and the \
                 list of available agents, decide which agents (if any) should handle it."
                .to_string(),
        }
    }
}

#[derive(Deserialize)]
struct AiReasoningPayload {
    agents: Vec<String>,
    #[serde(default)]
    parameters: HashMap<String, Value>,
    #[serde(default)]
    parallel: bool,
    confidence: f64,
    reasoning_text: String,
    #[serde(default)]
    rejection_reason: Option<String>,
}

impl AiStrategy {
    fn build_prompt(&self, query_text: &str, registry: &AgentRegistry) -> String {
        let descriptors = registry.list();
        let mut catalog = String::new();
        for descriptor in &descriptors {
            catalog.push_str(&format!(
                "- {}: {} (capabilities: {})\n",
                descriptor.name,
                descriptor.description,
                descriptor
                    .normalized_capabilities()
                    .into_iter()
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        format!(
            "{preamble}\n\nAvailable agents:\n{catalog}\nQuery: {query}\n\n\
             Respond with a single JSON object matching this shape exactly, and nothing else:\n\
             {{\"agents\": [string], \"parameters\": {{agent_name: object}}, \"parallel\": bool, \
             \"confidence\": number between 0 and 1, \"reasoning_text\": string, \
             \"rejection_reason\": string or null}}",
            preamble = self.system_prompt_preamble,
            catalog = catalog,
            query = query_text,
        )
    }

    /// Strips a ```json fenced block if the model wrapped its answer
    /// in one, otherwise returns the text unchanged.
    fn strip_fence(text: &str) -> &str {
        let trimmed = text.trim();
        if let Some(rest) = trimmed.strip_prefix("```json") {
            rest.strip_suffix("```").unwrap_or(rest).trim()
        } else if let Some(rest) = trimmed.strip_prefix("```") {
            rest.strip_suffix("```").unwrap_or(rest).trim()
        } else {
            trimmed
        }
    }

    pub async fn evaluate(
        &self,
        query_text: &str,
        registry: &AgentRegistry,
        gw: &Gateway,
    ) -> Option<ReasoningResult> {
        let prompt = self.build_prompt(query_text, registry);
        let request = GenerateRequest {
            messages: vec![ChatMessage { role: MessageRole::User, content: prompt }],
            provider: None,
            model: None,
            max_tokens: 1024,
            temperature: 0.0,
        };

        let call = match gw.generate(request).await {
            Ok(call) => call,
            Err(err) => {
                warn!(error = %err, "AI strategy: gateway call failed");
                return None;
            }
        };

        let raw = Self::strip_fence(&call.response.content);
        let payload: AiReasoningPayload = match serde_json::from_str(raw) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "AI strategy: response failed schema parse");
                return None;
            }
        };

        if !(0.0..=1.0).contains(&payload.confidence) {
            warn!(confidence = payload.confidence, "AI strategy: confidence out of range");
            return None;
        }

        let is_reject = payload.agents.is_empty();
        let result = ReasoningResult {
            agents: payload.agents,
            parameters: payload.parameters,
            parallel: payload.parallel,
            confidence: payload.confidence,
            method: if is_reject { ReasoningMethod::Reject } else { ReasoningMethod::Ai },
            reasoning_text: payload.reasoning_text,
            rejection_reason: payload.rejection_reason,
        };

        if !result.is_well_formed() {
            warn!("AI strategy: reasoning result violates reject<=>no-agents invariant");
            return None;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_code_fence() {
        let fenced = "```json\n{\"a\":1}\n```";
        assert_eq!(AiStrategy::strip_fence(fenced), "{\"a\":1}");
    }

    #[test]
    fn leaves_unfenced_text_untouched() {
        assert_eq!(AiStrategy::strip_fence("{\"a\":1}"), "{\"a\":1}");
    }
}
