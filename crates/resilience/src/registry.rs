//! Per-target breaker registry. Targets are agent names or provider
//! names; breakers are created lazily on first use and shared via
//! `Arc` so the executor and gateway never hold the registry's lock
//! across an I/O call.

use std::sync::Arc;

use contracts::CircuitBreakerState;
use dashmap::DashMap;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    pub fn get(&self, target: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(target, self.config.clone())))
            .clone()
    }

    pub fn snapshot(&self, target: &str) -> Option<CircuitBreakerState> {
        self.breakers.get(target).map(|b| b.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazily_creates_one_breaker_per_target() {
        let registry = BreakerRegistry::new(CircuitBreakerConfig::default());
        let a = registry.get("weather");
        let b = registry.get("weather");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.snapshot("calculator").is_none());
        registry.get("calculator");
        assert!(registry.snapshot("calculator").is_some());
    }
}
