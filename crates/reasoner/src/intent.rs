//! Account-specific vs. general intent classification.
//!
//! Signal: co-occurrence of a possessive indicator with a financial
//! term, evaluated over whitespace/punctuation-tokenized, lowercased
//! query text — not substring matching, so a bare "i" inside another
//! word never counts. A bare "I" used generically ("how do I apply")
//! does not alone trigger rejection; it must co-occur with a
//! financial term.

use once_cell::sync::Lazy;
use std::collections::HashSet;

static POSSESSIVE_INDICATORS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["my", "mine", "i", "me", "our"]));

static FINANCIAL_TERMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "balance",
        "transaction",
        "transactions",
        "account",
        "card",
        "loan",
        "mortgage",
        "payment",
        "investment",
        "portfolio",
    ])
});

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Returns `Some(reason)` when the query should be rejected as
/// account-specific; `None` when it may proceed as a general query.
pub fn classify_account_specific(text: &str) -> Option<&'static str> {
    let tokens = tokenize(text);
    let has_possessive = tokens.iter().any(|t| POSSESSIVE_INDICATORS.contains(t.as_str()));
    let has_financial = tokens.iter().any(|t| FINANCIAL_TERMS.contains(t.as_str()));
    if has_possessive && has_financial {
        Some("account_specific")
    } else {
        None
    }
}
