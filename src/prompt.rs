//! Grounded prompt construction for the generation collaborator.
//!
//! The prompt carries everything the narrative is allowed to mention —
//! customer block, transaction lines, detected patterns, advisory evidence,
//! retrieved templates — and instructs the model to invent nothing beyond it.
//! The amount validator later enforces exactly that.

use crate::case::{CaseContext, Transaction};
use crate::jurisdiction::JurisdictionProfile;
use crate::pattern_detector::PatternResult;
use crate::typology_context::TypologyContext;

/// Transactions rendered inline before the "... and N more" tail.
const TRANSACTION_PREVIEW_LIMIT: usize = 25;

/// Format an amount with comma grouping and two decimals ("49,000.00").
pub fn format_amount(value: f64) -> String {
    let negative = value < 0.0;
    let rounded = (value.abs() * 100.0).round() / 100.0;
    let whole = rounded.trunc() as u64;
    let cents = ((rounded - rounded.trunc()) * 100.0).round() as u64;

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{cents:02}")
}

fn transaction_line(txn: &Transaction, currency: &str) -> String {
    format!(
        "  - {currency}{} on {} from {} to {} ({}) [ref {}]",
        format_amount(txn.amount),
        txn.timestamp.format("%Y-%m-%d"),
        txn.source_account,
        txn.destination_account,
        txn.kind,
        txn.short_id(),
    )
}

/// Render the full generation prompt for one case.
pub fn build_generation_prompt(
    case: &CaseContext,
    patterns: &PatternResult,
    templates: &[String],
    context: &TypologyContext,
    profile: &JurisdictionProfile,
) -> String {
    let customer = &case.customer;
    let currency = profile.currency_symbol;

    let mut transaction_lines: Vec<String> = case
        .transactions
        .iter()
        .take(TRANSACTION_PREVIEW_LIMIT)
        .map(|t| transaction_line(t, currency))
        .collect();
    if case.transactions.len() > TRANSACTION_PREVIEW_LIMIT {
        transaction_lines.push(format!(
            "  ... and {} more transactions",
            case.transactions.len() - TRANSACTION_PREVIEW_LIMIT
        ));
    }

    let typologies = patterns
        .typologies
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let templates_text = if templates.is_empty() {
        "No templates available.".to_string()
    } else {
        templates.join("\n\n---\n\n")
    };

    let stated_income = customer
        .stated_income
        .map(|income| format!("{currency}{}", format_amount(income)))
        .unwrap_or_else(|| "N/A".to_string());

    let sections = profile
        .sar_sections
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {s}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a senior bank compliance analyst writing a Suspicious Activity Report (SAR) \
for regulatory submission to the {regulatory_body}.\n\
\n\
**CRITICAL INSTRUCTIONS:**\n\
- Use ONLY the data provided below. DO NOT invent any amounts, dates, or account numbers.\n\
- Every number you write MUST appear in the source data.\n\
- Cite specific transaction details when describing activity.\n\
- Write in formal regulatory language compliant with {legal_terminology}.\n\
- Use {currency} for all financial amounts.\n\
- This report will be filed using the {reporting_form}.\n\
\n\
**CUSTOMER INFORMATION:**\n\
Name: {name}\n\
Account Number: {account}\n\
Occupation: {occupation}\n\
Stated Income: {stated_income}\n\
Secondary ID ({identity_name}): Provided in KYC\n\
\n\
**TRANSACTION SUMMARY ({txn_count} transactions):**\n\
{transactions}\n\
\n\
**DETECTED PATTERNS:**\n\
- Risk Score: {risk_score}/10\n\
- Detected Typologies: {typologies}\n\
- Velocity: {span_days} days span, {per_day} transactions/day ({velocity_risk:?} risk)\n\
- Total Amount: {currency}{total}\n\
- Average Amount: {currency}{mean}\n\
- Unique Source Accounts: {unique_sources}\n\
- Unique Destination Accounts: {unique_destinations}\n\
- Structuring Likelihood: {likelihood:.1}%\n\
- Near-Threshold Transactions: {near_count} (Filing threshold: {filing_threshold})\n\
\n\
**REGULATORY EVIDENCE:**\n\
{evidence}\n\
\n\
**REFERENCE TEMPLATES:**\n\
{templates}\n\
\n\
**YOUR TASK:**\n\
Write a complete SAR narrative formatted with these sections required by {regulatory_body}:\n\
\n\
{sections}\n\
\n\
**NARRATIVE REQUIREMENTS:**\n\
- Length: 3-4 paragraphs, 400-600 words.\n\
- Tone: formal regulatory language compliant with {legal_terminology}.\n\
- Explain why the activity is suspicious based on the source data.\n\
- {insight} Must be integrated into the relevant section.\n\
- Reference the {filing_threshold} limit when discussing structuring.\n\
\n\
Write in a factual and specific manner. Reference actual data points.",
        regulatory_body = profile.regulatory_body,
        legal_terminology = profile.legal_terminology,
        reporting_form = profile.reporting_form,
        name = customer.name,
        account = customer.account_number,
        occupation = customer.occupation.as_deref().unwrap_or("N/A"),
        identity_name = profile.identity_name,
        txn_count = case.transactions.len(),
        transactions = transaction_lines.join("\n"),
        risk_score = patterns.risk_score,
        span_days = patterns.velocity.span_days,
        per_day = patterns.velocity.per_day,
        velocity_risk = patterns.velocity.risk,
        total = format_amount(patterns.volume.total),
        mean = format_amount(patterns.volume.mean),
        unique_sources = patterns.network.unique_sources,
        unique_destinations = patterns.network.unique_destinations,
        likelihood = patterns.structuring.likelihood * 100.0,
        near_count = patterns.structuring.near_threshold_count,
        filing_threshold = profile.filing_threshold,
        evidence = context.evidence_text,
        templates = templates_text,
        sections = sections,
        insight = context.insight_text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::Customer;
    use crate::jurisdiction;
    use crate::pattern_detector::{DetectionConfig, PatternDetector};
    use crate::typology_context::AdvisoryRegistry;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn test_format_amount_grouping() {
        assert_eq!(format_amount(49_000.0), "49,000.00");
        assert_eq!(format_amount(7_500_000.0), "7,500,000.00");
        assert_eq!(format_amount(999.5), "999.50");
        assert_eq!(format_amount(0.0), "0.00");
    }

    #[test]
    fn test_prompt_contains_case_facts() {
        let case = CaseContext {
            case_id: "case-9".into(),
            customer: Customer {
                id: Uuid::new_v4(),
                name: "Rajesh Kumar".into(),
                account_number: "ACC-7001".into(),
                occupation: Some("importer".into()),
                stated_income: Some(1_200_000.0),
                customer_since: None,
            },
            transactions: vec![crate::case::Transaction {
                id: Uuid::new_v4(),
                amount: 49_000.0,
                timestamp: Utc.with_ymd_and_hms(2024, 4, 2, 11, 0, 0).unwrap(),
                source_account: "ACC-100".into(),
                destination_account: "ACC-7001".into(),
                kind: "deposit".into(),
            }],
        };
        let detector = PatternDetector::new(DetectionConfig::default());
        let patterns = detector.detect(&case);
        let context =
            AdvisoryRegistry::builtin().typology_context(&patterns.typologies, "IN");
        let profile = jurisdiction::profile("IN");

        let prompt = build_generation_prompt(&case, &patterns, &[], &context, &profile);

        assert!(prompt.contains("Rajesh Kumar"));
        assert!(prompt.contains("ACC-7001"));
        assert!(prompt.contains("₹49,000.00"));
        assert!(prompt.contains("No templates available."));
        assert!(prompt.contains("FIU-IND"));
    }

    #[test]
    fn test_prompt_truncates_long_transaction_lists() {
        let txns: Vec<_> = (0..30)
            .map(|i| crate::case::Transaction {
                id: Uuid::new_v4(),
                amount: 10_000.0 + i as f64,
                timestamp: Utc.with_ymd_and_hms(2024, 4, 2, 11, 0, 0).unwrap(),
                source_account: format!("SRC-{i}"),
                destination_account: "ACC-7001".into(),
                kind: "deposit".into(),
            })
            .collect();
        let case = CaseContext {
            case_id: "case-10".into(),
            customer: Customer {
                id: Uuid::new_v4(),
                name: "Rajesh Kumar".into(),
                account_number: "ACC-7001".into(),
                occupation: None,
                stated_income: None,
                customer_since: None,
            },
            transactions: txns,
        };
        let detector = PatternDetector::new(DetectionConfig::default());
        let patterns = detector.detect(&case);
        let context =
            AdvisoryRegistry::builtin().typology_context(&patterns.typologies, "IN");
        let profile = jurisdiction::profile("IN");

        let prompt = build_generation_prompt(&case, &patterns, &[], &context, &profile);
        assert!(prompt.contains("... and 5 more transactions"));
    }
}
