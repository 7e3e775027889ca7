//! Anti-hallucination checks on generated narratives.
//!
//! Two independent, pure checks: structural (length, required identifiers,
//! banned assistant phrasing, domain keywords) and factual (every material
//! currency amount in the prose must exist in the source transaction data).
//! The pipeline treats a failure of either as fatal — an unverifiable
//! narrative is discarded, never persisted as final output.

use serde::{Deserialize, Serialize};

use crate::case::{Customer, Transaction};

/// Validator thresholds and phrase lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum narrative length in words.
    pub min_word_count: usize,
    /// Amounts at or below this value (₹) are immaterial and not checked.
    pub materiality_threshold: f64,
    /// Absolute tolerance when matching narrative amounts to source amounts.
    pub amount_tolerance: f64,
    /// Generic-assistant phrases that disqualify a narrative outright.
    pub denylist: Vec<String>,
    /// Domain keywords of which at least one must appear.
    pub allowlist: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            min_word_count: 100,
            materiality_threshold: 1_000.0,
            amount_tolerance: 1.0,
            denylist: vec![
                "I cannot".to_string(),
                "I'm sorry".to_string(),
                "As an AI".to_string(),
            ],
            allowlist: vec![
                "activity".to_string(),
                "transaction".to_string(),
                "suspicious".to_string(),
            ],
        }
    }
}

/// Outcome of one validation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    pub passed: bool,
    pub failures: Vec<String>,
}

impl CheckReport {
    fn from_failures(failures: Vec<String>) -> Self {
        CheckReport {
            passed: failures.is_empty(),
            failures,
        }
    }
}

pub struct NarrativeValidator {
    config: ValidationConfig,
}

impl NarrativeValidator {
    pub fn new(config: ValidationConfig) -> Self {
        NarrativeValidator { config }
    }

    /// Structural checks. Deterministic, no I/O.
    pub fn validate_structure(&self, narrative: &str, customer: &Customer) -> CheckReport {
        let mut failures = Vec::new();
        let lowered = narrative.to_lowercase();

        let word_count = narrative.split_whitespace().count();
        if word_count < self.config.min_word_count {
            failures.push(format!(
                "narrative too short ({word_count} words, minimum {})",
                self.config.min_word_count
            ));
        }

        if !customer.name.is_empty() && !narrative.contains(&customer.name) {
            failures.push(format!("customer name '{}' not mentioned", customer.name));
        }

        if !customer.account_number.is_empty() && !narrative.contains(&customer.account_number) {
            failures.push("customer account number not referenced".to_string());
        }

        for phrase in &self.config.denylist {
            if lowered.contains(&phrase.to_lowercase()) {
                failures.push(format!("contains generic assistant phrasing: '{phrase}'"));
            }
        }

        let keyword_found = self
            .config
            .allowlist
            .iter()
            .any(|keyword| lowered.contains(&keyword.to_lowercase()));
        if !keyword_found {
            failures.push("no domain keyword present".to_string());
        }

        CheckReport::from_failures(failures)
    }

    /// Factual amount check: every ₹-formatted value above the materiality
    /// threshold must match a source transaction amount, or the transaction
    /// total, within tolerance. Each unmatched amount is its own failure and
    /// carries the offending value.
    pub fn validate_amounts(&self, narrative: &str, transactions: &[Transaction]) -> CheckReport {
        let mut source_amounts: Vec<f64> = transactions.iter().map(|t| t.amount).collect();
        let total: f64 = source_amounts.iter().sum();
        source_amounts.push(total);

        let failures = currency_tokens(narrative)
            .into_iter()
            .filter(|token| token.value > self.config.materiality_threshold)
            .filter(|token| {
                !source_amounts
                    .iter()
                    .any(|&src| (token.value - src).abs() < self.config.amount_tolerance)
            })
            .map(|token| format!("amount {} not found in source data", token.raw))
            .collect();

        CheckReport::from_failures(failures)
    }
}

struct CurrencyToken {
    raw: String,
    value: f64,
}

/// Scan for `₹`-prefixed numeric tokens. Comma grouping (western or Indian)
/// is stripped before parsing.
fn currency_tokens(text: &str) -> Vec<CurrencyToken> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '₹' {
            continue;
        }

        let mut raw = String::from('₹');
        while let Some(&next) = chars.peek() {
            if next.is_ascii_digit() || next == ',' || next == '.' {
                raw.push(next);
                chars.next();
            } else {
                break;
            }
        }

        let cleaned: String = raw
            .trim_start_matches('₹')
            .trim_end_matches(['.', ','])
            .chars()
            .filter(|c| *c != ',')
            .collect();

        if let Ok(value) = cleaned.parse::<f64>() {
            tokens.push(CurrencyToken {
                raw: raw.trim_end_matches(['.', ',']).to_string(),
                value,
            });
        }
    }

    tokens
}
