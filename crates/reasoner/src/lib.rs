//! Reasoner (C5): rule-based and AI-based intent-to-agent selection,
//! with account-specific intent classification gating both.

pub mod ai;
pub mod intent;
pub mod rule;

use contracts::{ReasoningMode, ReasoningResult, RouterError};
use gateway::Gateway;
use registry::AgentRegistry;

pub use ai::AiStrategy;
pub use rule::{RuleEntry, RuleStrategy};

pub struct ReasonerConfig {
    pub rule_accept_threshold: f64,
    pub default_mode: ReasoningMode,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self { rule_accept_threshold: 0.6, default_mode: ReasoningMode::Hybrid }
    }
}

pub struct Reasoner {
    rule: RuleStrategy,
    ai: AiStrategy,
    config: ReasonerConfig,
}

impl Reasoner {
    pub fn new(config: ReasonerConfig) -> Self {
        Self {
            rule: RuleStrategy { rules: rule::default_rules(), accept_threshold: config.rule_accept_threshold },
            ai: AiStrategy::default(),
            config,
        }
    }

    pub async fn reason(
        &self,
        query_text: &str,
        mode: Option<ReasoningMode>,
        registry: &AgentRegistry,
        gw: &Gateway,
    ) -> Result<ReasoningResult, RouterError> {
        if let Some(reason) = intent::classify_account_specific(query_text) {
            return Ok(ReasoningResult::reject(
                reason,
                format!("possessive indicator co-occurring with a financial term in: {query_text}"),
            ));
        }

        let mode = mode.unwrap_or(self.config.default_mode);
        match mode {
            ReasoningMode::Rule => self.rule.evaluate(query_text).ok_or(RouterError::NoRouteFound),
            ReasoningMode::Ai => self
                .ai
                .evaluate(query_text, registry, gw)
                .await
                .ok_or(RouterError::NoRouteFound),
            ReasoningMode::Hybrid => {
                if let Some(result) = self.rule.evaluate(query_text) {
                    return Ok(result);
                }
                if let Some(result) = self.ai.evaluate(query_text, registry, gw).await {
                    return Ok(result);
                }
                Err(RouterError::NoRouteFound)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn account_specific_query_is_rejected_before_any_strategy_runs() {
        let reasoner = Reasoner::new(ReasonerConfig::default());
        let registry = AgentRegistry::new();
        let gw = Gateway::new(vec![], gateway::GatewayConfig::default(), Default::default());
        let result = reasoner
            .reason("what is my credit card balance", None, &registry, &gw)
            .await
            .unwrap();
        assert_eq!(result.method, contracts::ReasoningMethod::Reject);
        assert_eq!(result.rejection_reason.as_deref(), Some("account_specific"));
        assert!(result.agents.is_empty());
    }

    #[tokio::test]
    async fn rule_mode_matches_without_calling_gateway() {
        let reasoner = Reasoner::new(ReasonerConfig::default());
        let registry = AgentRegistry::new();
        let gw = Gateway::new(vec![], gateway::GatewayConfig::default(), Default::default());
        let result = reasoner
            .reason("weather in Paris", Some(ReasoningMode::Rule), &registry, &gw)
            .await
            .unwrap();
        assert_eq!(result.agents, vec!["weather"]);
    }

    #[tokio::test]
    async fn rule_only_mode_rejects_when_no_rule_matches() {
        let reasoner = Reasoner::new(ReasonerConfig::default());
        let registry = AgentRegistry::new();
        let gw = Gateway::new(vec![], gateway::GatewayConfig::default(), Default::default());
        let err = reasoner
            .reason("tell me a joke", Some(ReasoningMode::Rule), &registry, &gw)
            .await
            .unwrap_err();
        assert!(matches!(err, RouterError::NoRouteFound));
    }
}
