//! C8 Validator: JSON-Schema structural checks, required-field
//! presence, and a hallucination heuristic, composed into one
//! `ValidationVerdict` per step output.
//!
//! Grounded in `schema_validator.py`'s `SchemaValidator.validate()` /
//! `validate_required_fields()` pair: both return a boolean plus a list
//! of human-readable violation strings, and both are driven off
//! dot-notation paths rather than a bespoke path DSL.

pub mod heuristic;

use contracts::{AgentDescriptor, ValidationVerdict};
use heuristic::{DefaultHeuristic, HallucinationHeuristic};
use serde_json::Value;

/// Per-query validation behavior, set from `AppConfig`.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// When true, any schema or required-field violation fails the
    /// step. When false, violations are recorded in `issues` but
    /// `is_valid` stays true.
    pub strict: bool,
    pub retry_on_hallucination: bool,
    pub max_revalidation_attempts: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            strict: true,
            retry_on_hallucination: true,
            max_revalidation_attempts: 1,
        }
    }
}

pub struct Validator {
    heuristic: Box<dyn HallucinationHeuristic>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Box::new(DefaultHeuristic::default()))
    }
}

impl Validator {
    pub fn new(heuristic: Box<dyn HallucinationHeuristic>) -> Self {
        Self { heuristic }
    }

    /// Validates one step's output against its agent's descriptor.
    /// `output` is `None` when the step produced nothing to validate
    /// (failed, skipped, cancelled) -- callers should not invoke this
    /// in that case, but an empty verdict is returned defensively.
    pub fn validate_step(
        &self,
        output: Option<&Value>,
        descriptor: &AgentDescriptor,
        reported_confidence: Option<f64>,
        config: &ValidatorConfig,
    ) -> ValidationVerdict {
        let Some(output) = output else {
            return ValidationVerdict::failing(vec!["step produced no output to validate".to_string()]);
        };

        let mut issues = Vec::new();

        if let Some(schema) = &descriptor.output_schema {
            issues.extend(validate_schema(output, schema));
        }

        issues.extend(validate_required_fields(output, &descriptor.required_fields));

        let (hallucination_detected, confidence_score, hallucination_issues) =
            self.heuristic.check(output, reported_confidence);
        issues.extend(hallucination_issues);

        let is_valid = if config.strict {
            issues.is_empty() && !hallucination_detected
        } else {
            true
        };

        ValidationVerdict {
            is_valid,
            confidence_score,
            hallucination_detected,
            issues,
            per_field_scores: None,
        }
    }

    /// Whether a failed verdict should trigger a fresh attempt at the
    /// same step, bounded by `max_revalidation_attempts`.
    pub fn should_retry(&self, verdict: &ValidationVerdict, config: &ValidatorConfig, attempts_so_far: u32) -> bool {
        if attempts_so_far >= config.max_revalidation_attempts {
            return false;
        }
        !verdict.is_valid && (config.retry_on_hallucination || !verdict.hallucination_detected)
    }
}

/// Compiles `schema` as a Draft 2020-12-compatible JSON Schema (the
/// crate auto-detects `$schema`, defaulting to the latest draft it
/// supports) and validates `instance` against it, formatting each
/// violation as `"{instance_path}: {message}"` the way the reference
/// implementation formats `ValidationError` instances.
fn validate_schema(instance: &Value, schema: &Value) -> Vec<String> {
    let compiled = match jsonschema::JSONSchema::compile(schema) {
        Ok(compiled) => compiled,
        Err(err) => return vec![format!("invalid output_schema: {err}")],
    };

    match compiled.validate(instance) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|error| {
                let path = error.instance_path.to_string();
                let path = if path.is_empty() { "root".to_string() } else { path };
                format!("{path}: {error}")
            })
            .collect(),
    }
}

/// Checks that every dot-notation path in `required_fields` resolves
/// to a present (not necessarily non-null) value in `instance`.
fn validate_required_fields(instance: &Value, required_fields: &[String]) -> Vec<String> {
    required_fields
        .iter()
        .filter(|field| !has_dotted_field(instance, field))
        .map(|field| format!("missing required field: {field}"))
        .collect()
}

fn has_dotted_field(instance: &Value, path: &str) -> bool {
    let mut current = instance;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(value) => current = value,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::InvocationHandle;
    use std::collections::BTreeSet;

    fn descriptor(output_schema: Option<Value>, required_fields: Vec<&str>) -> AgentDescriptor {
        AgentDescriptor {
            name: "weather".to_string(),
            capabilities: BTreeSet::from(["weather".to_string()]),
            description: "reports weather".to_string(),
            input_schema: None,
            output_schema,
            invocation_handle: InvocationHandle::InProcess { callable: "weather".into() },
            is_privileged: false,
            required_fields: required_fields.into_iter().map(String::from).collect(),
            timeout_ms: 5_000,
            max_retries: 1,
        }
    }

    #[test]
    fn missing_required_field_is_an_issue_in_strict_mode() {
        let validator = Validator::default();
        let config = ValidatorConfig { strict: true, ..ValidatorConfig::default() };
        let output = serde_json::json!({"temperature": 72});
        let verdict = validator.validate_step(
            Some(&output),
            &descriptor(None, vec!["temperature", "city"]),
            Some(0.9),
            &config,
        );
        assert!(!verdict.is_valid);
        assert!(verdict.issues.iter().any(|i| i.contains("city")));
    }

    #[test]
    fn non_strict_mode_records_but_does_not_fail() {
        let validator = Validator::default();
        let config = ValidatorConfig { strict: false, ..ValidatorConfig::default() };
        let output = serde_json::json!({"temperature": 72});
        let verdict = validator.validate_step(
            Some(&output),
            &descriptor(None, vec!["city"]),
            Some(0.9),
            &config,
        );
        assert!(verdict.is_valid);
        assert_eq!(verdict.issues.len(), 1);
    }

    #[test]
    fn schema_violation_is_path_qualified() {
        let validator = Validator::default();
        let config = ValidatorConfig::default();
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"temperature": {"type": "number"}},
            "required": ["temperature"]
        });
        let output = serde_json::json!({"temperature": "warm"});
        let verdict = validator.validate_step(Some(&output), &descriptor(Some(schema), vec![]), Some(0.9), &config);
        assert!(!verdict.is_valid);
        assert!(verdict.issues.iter().any(|i| i.contains("temperature")));
    }

    #[test]
    fn well_formed_output_passes_schema_and_fields() {
        let validator = Validator::default();
        let config = ValidatorConfig::default();
        let schema = serde_json::json!({
            "type": "object",
            "properties": {"temperature": {"type": "number"}},
            "required": ["temperature"]
        });
        let output = serde_json::json!({"temperature": 72});
        let verdict = validator.validate_step(
            Some(&output),
            &descriptor(Some(schema), vec!["temperature"]),
            Some(0.9),
            &config,
        );
        assert!(verdict.is_valid);
        assert!(verdict.issues.is_empty());
    }

    #[test]
    fn no_output_is_always_a_failing_verdict() {
        let validator = Validator::default();
        let config = ValidatorConfig::default();
        let verdict = validator.validate_step(None, &descriptor(None, vec![]), None, &config);
        assert!(!verdict.is_valid);
    }

    #[test]
    fn should_retry_respects_attempt_cap() {
        let validator = Validator::default();
        let config = ValidatorConfig { max_revalidation_attempts: 1, ..ValidatorConfig::default() };
        let verdict = ValidationVerdict::failing(vec!["bad".into()]);
        assert!(validator.should_retry(&verdict, &config, 0));
        assert!(!validator.should_retry(&verdict, &config, 1));
    }
}
