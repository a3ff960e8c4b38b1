//! C12 Config Loader: resolves `AppConfig` from three layers, lowest
//! to highest precedence -- compiled-in defaults, an optional TOML
//! file, and `AGENT_ROUTER__<SECTION>__<KEY>` environment variables --
//! following the teacher's `figment`-based layering convention.
//!
//! Invalid values are rejected at startup, never silently clamped.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub order: Vec<String>,
    pub max_attempts: usize,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self { enabled: true, order: Vec::new(), max_attempts: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BreakerConfig {
    pub threshold: u32,
    pub cooldown_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { threshold: 5, cooldown_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base_backoff_ms: 200, jitter_ms: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutorConfig {
    pub max_parallel_agents: usize,
    pub default_step_timeout_ms: u64,
    pub query_deadline_ms: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_parallel_agents: 8, default_step_timeout_ms: 10_000, query_deadline_ms: 30_000 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidatorConfig {
    pub strict: bool,
    pub retry_on_hallucination: bool,
    pub max_revalidation_attempts: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self { strict: true, retry_on_hallucination: true, max_revalidation_attempts: 1 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningModeSetting {
    Rule,
    Ai,
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReasonerConfig {
    pub rule_accept_threshold: f64,
    pub mode: ReasoningModeSetting,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self { rule_accept_threshold: 0.6, mode: ReasoningModeSetting::Hybrid }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditConfig {
    pub dir: PathBuf,
    pub enabled: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { dir: PathBuf::from("logs/queries"), enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub auth_api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8080, auth_api_key: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Json }
    }
}

/// The fully-resolved, validated configuration surface (§10).
/// Immutable after startup; share via `Arc<AppConfig>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub fallback: FallbackConfig,
    pub breaker: BreakerConfig,
    pub retry: RetryConfig,
    pub executor: ExecutorConfig,
    pub validator: ValidatorConfig,
    pub reasoner: ReasonerConfig,
    pub audit: AuditConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to resolve configuration: {0}")]
    Resolve(#[from] figment::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

const ENV_PREFIX: &str = "AGENT_ROUTER__";
const CONFIG_PATH_VAR: &str = "AGENT_ROUTER_CONFIG";

/// Loads `AppConfig`, merging defaults, an optional TOML file, and
/// `AGENT_ROUTER__SECTION__KEY` environment overrides, then validates
/// the result.
pub fn load(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    let file_path = config_path.map(PathBuf::from).or_else(|| std::env::var(CONFIG_PATH_VAR).ok().map(PathBuf::from));
    if let Some(path) = &file_path {
        tracing::info!(path = %path.display(), "loading configuration file");
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: AppConfig = figment.extract()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    if config.breaker.threshold == 0 {
        return Err(ConfigError::Invalid("breaker.threshold must be greater than 0".to_string()));
    }
    if config.fallback.max_attempts == 0 {
        return Err(ConfigError::Invalid("fallback.max_attempts must be greater than 0".to_string()));
    }
    if config.retry.max_attempts == 0 {
        return Err(ConfigError::Invalid("retry.max_attempts must be greater than 0".to_string()));
    }
    if config.executor.max_parallel_agents == 0 {
        return Err(ConfigError::Invalid("executor.max_parallel_agents must be greater than 0".to_string()));
    }
    if config.executor.query_deadline_ms == 0 {
        return Err(ConfigError::Invalid("executor.query_deadline_ms must be greater than 0".to_string()));
    }
    if !(0.0..=1.0).contains(&config.reasoner.rule_accept_threshold) {
        return Err(ConfigError::Invalid("reasoner.rule_accept_threshold must be in [0.0, 1.0]".to_string()));
    }
    if config.validator.max_revalidation_attempts > 10 {
        return Err(ConfigError::Invalid("validator.max_revalidation_attempts is implausibly large".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate_cleanly() {
        assert!(validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn zero_breaker_threshold_is_rejected() {
        let mut config = AppConfig::default();
        config.breaker.threshold = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rule_accept_threshold_outside_unit_range_is_rejected() {
        let mut config = AppConfig::default();
        config.reasoner.rule_accept_threshold = 1.5;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nhost = \"127.0.0.1\"\nport = 9000\n").unwrap();
        let config = load(Some(file.path())).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn env_override_takes_precedence_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9000\n").unwrap();
        std::env::set_var("AGENT_ROUTER__SERVER__PORT", "9500");
        let config = load(Some(file.path())).unwrap();
        std::env::remove_var("AGENT_ROUTER__SERVER__PORT");
        assert_eq!(config.server.port, 9500);
    }
}
