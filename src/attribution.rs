//! Sentence-level attribution: maps each sentence of a generated narrative
//! back to the source records that justify it.
//!
//! Segmentation and matching are deliberately simple and exactly specified so
//! that indices are deterministic: identical inputs always produce identical
//! output, which is what lets the attribution stored in the audit trail be
//! reproduced later from the same narrative and case data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::case::{Customer, Transaction};

/// Amounts mentioned in prose are matched against source amounts to the
/// nearest rupee.
const AMOUNT_TOLERANCE: f64 = 1.0;

/// What one sentence of the narrative references in the source data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceAttribution {
    pub text: String,
    pub transaction_ids: Vec<String>,
    pub amounts: Vec<f64>,
    pub accounts: Vec<String>,
    pub has_reference: bool,
    pub position: usize,
}

/// Split narrative text into sentences. A boundary is the position
/// immediately after `.`, `!` or `?` when the next character is whitespace;
/// empty fragments are discarded. This exact rule is load-bearing: the
/// resulting indices key the persisted attribution map.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            if let Some(next) = chars.peek() {
                if next.is_whitespace() {
                    let fragment = current.trim();
                    if !fragment.is_empty() {
                        sentences.push(fragment.to_string());
                    }
                    current.clear();
                }
            }
        }
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Attribute every sentence of `narrative` against the case's transactions
/// and customer. Pure and stateless.
pub fn attribute(
    narrative: &str,
    transactions: &[Transaction],
    customer: &Customer,
) -> Vec<SentenceAttribution> {
    split_sentences(narrative)
        .into_iter()
        .enumerate()
        .map(|(position, text)| attribute_sentence(text, position, transactions, customer))
        .collect()
}

fn attribute_sentence(
    text: String,
    position: usize,
    transactions: &[Transaction],
    customer: &Customer,
) -> SentenceAttribution {
    let mut transaction_ids = Vec::new();
    let mut amounts = Vec::new();
    let mut accounts: BTreeSet<String> = BTreeSet::new();

    let numeric_tokens = numeric_tokens(&text);

    for txn in transactions {
        let full_id = txn.id.to_string();
        if text.contains(&full_id) || text.contains(&txn.short_id()) {
            transaction_ids.push(full_id);
        }

        if numeric_tokens
            .iter()
            .any(|&token| (token - txn.amount).abs() < AMOUNT_TOLERANCE)
            && !amounts
                .iter()
                .any(|&seen: &f64| (seen - txn.amount).abs() < f64::EPSILON)
        {
            amounts.push(txn.amount);
        }

        if !txn.source_account.is_empty() && text.contains(&txn.source_account) {
            accounts.insert(txn.source_account.clone());
        }
        if !txn.destination_account.is_empty() && text.contains(&txn.destination_account) {
            accounts.insert(txn.destination_account.clone());
        }
    }

    if !customer.account_number.is_empty() && text.contains(&customer.account_number) {
        accounts.insert(customer.account_number.clone());
    }

    let has_reference = !transaction_ids.is_empty() || !amounts.is_empty() || !accounts.is_empty();

    SentenceAttribution {
        text,
        transaction_ids,
        amounts,
        accounts: accounts.into_iter().collect(),
        has_reference,
        position,
    }
}

/// Extract numeric tokens from prose: runs of digits with optional comma
/// grouping and a decimal part. Grouping style does not matter — commas are
/// stripped before parsing, so both "49,000" and "75,00,000" resolve.
fn numeric_tokens(text: &str) -> Vec<f64> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_ascii_digit() || ((ch == ',' || ch == '.') && !current.is_empty()) {
            current.push(ch);
        } else if !current.is_empty() {
            push_token(&mut tokens, &current);
            current.clear();
        }
    }
    if !current.is_empty() {
        push_token(&mut tokens, &current);
    }

    tokens
}

fn push_token(tokens: &mut Vec<f64>, raw: &str) {
    let cleaned: String = raw
        .trim_end_matches(['.', ','])
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if let Ok(value) = cleaned.parse::<f64>() {
        tokens.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn fixture() -> (Vec<Transaction>, Customer) {
        let txn = Transaction {
            id: "deadbeef-1111-2222-3333-444455556666".parse().unwrap(),
            amount: 49_000.0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap(),
            source_account: "ACC-100".into(),
            destination_account: "ACC-200".into(),
            kind: "transfer".into(),
        };
        let customer = Customer {
            id: Uuid::new_v4(),
            name: "Rajesh Kumar".into(),
            account_number: "ACC-200".into(),
            occupation: None,
            stated_income: None,
            customer_since: None,
        };
        (vec![txn], customer)
    }

    #[test]
    fn test_split_rule_exact() {
        let text = "First sentence. Second one! Third? No trailing space.Fourth";
        let sentences = split_sentences(text);
        // ".Fourth" has no whitespace after the period, so no boundary there.
        assert_eq!(
            sentences,
            vec![
                "First sentence.",
                "Second one!",
                "Third?",
                "No trailing space.Fourth"
            ]
        );
    }

    #[test]
    fn test_empty_fragments_discarded() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
        let sentences = split_sentences("One. . Two.");
        assert_eq!(sentences, vec!["One.", ".", "Two."]);
    }

    #[test]
    fn test_verbatim_transaction_id_yields_reference() {
        let (txns, customer) = fixture();
        let narrative =
            "Transaction deadbeef-1111-2222-3333-444455556666 moved funds. Nothing else here.";
        let attribution = attribute(narrative, &txns, &customer);

        assert!(attribution[0].has_reference);
        assert_eq!(
            attribution[0].transaction_ids,
            vec!["deadbeef-1111-2222-3333-444455556666"]
        );
        assert!(!attribution[1].has_reference);
    }

    #[test]
    fn test_short_id_form_matches() {
        let (txns, customer) = fixture();
        let narrative = "Reference deadbeef was flagged for review.";
        let attribution = attribute(narrative, &txns, &customer);
        assert_eq!(attribution[0].transaction_ids.len(), 1);
    }

    #[test]
    fn test_amount_with_grouping_matches() {
        let (txns, customer) = fixture();
        let narrative = "A deposit of ₹49,000 was observed on 15 January.";
        let attribution = attribute(narrative, &txns, &customer);
        assert_eq!(attribution[0].amounts, vec![49_000.0]);
        assert!(attribution[0].has_reference);
    }

    #[test]
    fn test_account_substring_matches() {
        let (txns, customer) = fixture();
        let narrative = "Funds flowed from ACC-100 into the subject account ACC-200.";
        let attribution = attribute(narrative, &txns, &customer);
        assert_eq!(attribution[0].accounts, vec!["ACC-100", "ACC-200"]);
    }

    #[test]
    fn test_deterministic_output() {
        let (txns, customer) = fixture();
        let narrative = "Deposit of ₹49,000 into ACC-200. Unrelated closing remark.";
        let a = attribute(narrative, &txns, &customer);
        let b = attribute(narrative, &txns, &customer);
        assert_eq!(a, b);
        assert_eq!(a[0].position, 0);
        assert_eq!(a[1].position, 1);
    }

    #[test]
    fn test_unreferenced_sentence() {
        let (txns, customer) = fixture();
        let attribution = attribute("The activity appears unusual.", &txns, &customer);
        assert!(!attribution[0].has_reference);
        assert!(attribution[0].amounts.is_empty());
    }
}
