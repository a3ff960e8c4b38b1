use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Verdict produced for either a single step output or the whole
/// consolidated response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub confidence_score: f64,
    pub hallucination_detected: bool,
    pub issues: Vec<String>,
    pub per_field_scores: Option<HashMap<String, f64>>,
}

impl ValidationVerdict {
    pub fn ok(confidence_score: f64) -> Self {
        Self {
            is_valid: true,
            confidence_score,
            hallucination_detected: false,
            issues: Vec::new(),
            per_field_scores: None,
        }
    }

    pub fn failing(issues: Vec<String>) -> Self {
        Self {
            is_valid: false,
            confidence_score: 0.0,
            hallucination_detected: false,
            issues,
            per_field_scores: None,
        }
    }
}
