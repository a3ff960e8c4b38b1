//! Pluggable hallucination heuristic (§9 Open Question): a confidence
//! floor plus forbidden-pattern matching against the serialized output,
//! matching the level of detail `schema_validator.py` applies to its
//! own structural checks rather than anything model-based.

use serde_json::Value;

/// Judges whether a step's output looks fabricated. Implementations
/// never see the whole plan, only one step's output and its reported
/// confidence.
pub trait HallucinationHeuristic: Send + Sync {
    /// Returns `(hallucination_detected, confidence_score, issues)`.
    fn check(&self, output: &Value, reported_confidence: Option<f64>) -> (bool, f64, Vec<String>);
}

/// Combines a confidence floor with a list of forbidden substrings
/// (case-insensitive) searched across the output's serialized text.
pub struct DefaultHeuristic {
    pub confidence_floor: f64,
    pub forbidden_patterns: Vec<String>,
}

impl Default for DefaultHeuristic {
    fn default() -> Self {
        Self {
            confidence_floor: 0.4,
            forbidden_patterns: vec![
                "as an ai language model".to_string(),
                "i cannot verify".to_string(),
                "i don't have access to real-time".to_string(),
            ],
        }
    }
}

impl HallucinationHeuristic for DefaultHeuristic {
    fn check(&self, output: &Value, reported_confidence: Option<f64>) -> (bool, f64, Vec<String>) {
        let haystack = output.to_string().to_lowercase();
        let mut issues = Vec::new();

        let matched_pattern = self
            .forbidden_patterns
            .iter()
            .find(|pattern| haystack.contains(pattern.to_lowercase().as_str()));
        if let Some(pattern) = matched_pattern {
            issues.push(format!("output matched forbidden pattern: '{pattern}'"));
        }

        let confidence = reported_confidence.unwrap_or(1.0);
        if confidence < self.confidence_floor {
            issues.push(format!(
                "confidence {confidence:.2} is below the floor {:.2}",
                self.confidence_floor
            ));
        }

        let hallucination_detected = matched_pattern.is_some() || confidence < self.confidence_floor;
        (hallucination_detected, confidence, issues)
    }
}
