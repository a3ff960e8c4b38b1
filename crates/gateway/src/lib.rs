//! Gateway Router (C2): routes a generation request to one of several
//! upstream providers, applies a configurable fallback chain on
//! failure, normalizes responses, and records per-attempt telemetry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use contracts::{
    GenerateRequest, GenerationResponse, ProviderAttempt, ProviderOutcome, RouterError,
};
use provider_adapter::ProviderAdapter;
use resilience::{call_guarded, BreakerRegistry, CircuitBreakerConfig, RetryConfig};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub fallback_enabled: bool,
    pub fallback_order: Vec<String>,
    pub max_fallback_attempts: usize,
    /// Accepted for forward compatibility; intentionally a no-op per
    /// the open question in the specification's design notes.
    pub retry_original: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            fallback_enabled: true,
            fallback_order: Vec::new(),
            max_fallback_attempts: 3,
            retry_original: false,
        }
    }
}

/// The result of one `/v1/generate` call: the normalized response and
/// the full attempt log, in the order attempts were made.
#[derive(Debug, Clone)]
pub struct GatewayCall {
    pub response: GenerationResponse,
    pub attempts: Vec<ProviderAttempt>,
}

pub struct Gateway {
    providers: HashMap<String, Arc<dyn ProviderAdapter>>,
    breakers: BreakerRegistry,
    config: GatewayConfig,
    per_attempt_retry: RetryConfig,
}

impl Gateway {
    pub fn new(
        providers: Vec<Arc<dyn ProviderAdapter>>,
        config: GatewayConfig,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.name().to_string(), p))
            .collect();
        Self {
            providers,
            breakers: BreakerRegistry::new(breaker_config),
            config,
            // A single attempt per provider per fallback step; the
            // fallback loop itself is the retry-across-targets layer.
            per_attempt_retry: RetryConfig {
                max_attempts: 1,
                base_backoff_ms: 0,
                max_backoff_ms: 0,
                jitter_ms: 0,
            },
        }
    }

    /// Builds the deduplicated attempt order: `preferred ∪
    /// fallback_order`, preserving insertion order, truncated to
    /// `max_fallback_attempts`. When fallback is disabled the order is
    /// just `[preferred]`.
    fn attempt_order(&self, preferred: &str) -> Vec<String> {
        if !self.config.fallback_enabled {
            return vec![preferred.to_string()];
        }
        let mut order = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for candidate in std::iter::once(preferred.to_string())
            .chain(self.config.fallback_order.iter().cloned())
        {
            if seen.insert(candidate.clone()) {
                order.push(candidate);
            }
        }
        order.truncate(self.config.max_fallback_attempts.max(1));
        order
    }

    pub async fn generate(&self, request: GenerateRequest) -> Result<GatewayCall, RouterError> {
        let preferred = request
            .provider
            .clone()
            .unwrap_or_else(|| self.default_provider());
        let order = self.attempt_order(&preferred);

        let mut attempts = Vec::new();
        for (idx, provider_name) in order.iter().enumerate() {
            let Some(adapter) = self.providers.get(provider_name) else {
                warn!(provider = %provider_name, "provider not registered, skipping");
                continue;
            };
            let breaker = self.breakers.get(provider_name);

            let started_at = Utc::now();
            let started = tokio::time::Instant::now();
            let call_result: Result<GenerationResponse, RouterError> = call_guarded(
                &breaker,
                &self.per_attempt_retry,
                || async {
                    adapter
                        .generate(
                            &request.messages,
                            request.model.as_deref(),
                            request.max_tokens,
                            request.temperature,
                        )
                        .await
                        .map_err(|e| {
                            if e.transient {
                                RouterError::Transient {
                                    target: e.provider.clone(),
                                    cause: e.cause.clone(),
                                }
                            } else {
                                RouterError::Permanent {
                                    target: e.provider.clone(),
                                    cause: e.cause.clone(),
                                }
                            }
                        })
                },
            )
            .await;
            let latency_ms = started.elapsed().as_millis() as u64;
            let ended_at = Utc::now();

            match call_result {
                Ok(mut response) => {
                    response.provider = provider_name.clone();
                    attempts.push(ProviderAttempt {
                        provider_name: provider_name.clone(),
                        started_at,
                        ended_at,
                        outcome: ProviderOutcome::Ok,
                        error_kind: None,
                        latency_ms,
                    });
                    if idx > 0 {
                        info!(
                            provider = %provider_name,
                            preferred = %preferred,
                            attempt = idx + 1,
                            "fallback succeeded"
                        );
                    }
                    return Ok(GatewayCall { response, attempts });
                }
                Err(err) => {
                    attempts.push(ProviderAttempt {
                        provider_name: provider_name.clone(),
                        started_at,
                        ended_at,
                        outcome: ProviderOutcome::Error,
                        error_kind: Some(err.kind().to_string()),
                        latency_ms,
                    });
                    warn!(provider = %provider_name, error = %err, "provider attempt failed");
                }
            }
        }

        Err(RouterError::AllProvidersFailed { attempts })
    }

    fn default_provider(&self) -> String {
        self.config
            .fallback_order
            .first()
            .cloned()
            .or_else(|| self.providers.keys().next().cloned())
            .unwrap_or_default()
    }

    pub async fn health(&self) -> HashMap<String, provider_adapter::ProviderHealth> {
        let mut out = HashMap::new();
        for (name, adapter) in &self.providers {
            out.insert(name.clone(), adapter.health_check().await);
        }
        out
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}
