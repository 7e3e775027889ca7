//! Narrative generation collaborator.
//!
//! Generation failure is fatal for the pipeline (unlike retrieval): a run
//! without a narrative has nothing to validate or persist. The reference
//! implementation talks to a local Ollama endpoint; a deterministic offline
//! renderer backs tests and dry runs through the same trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::case::CaseContext;
use crate::errors::{SarError, SarResult};
use crate::jurisdiction::JurisdictionProfile;
use crate::pattern_detector::PatternResult;
use crate::prompt::format_amount;

/// Per-call generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        GenerationOptions {
            temperature: 0.2,
            max_tokens: 800,
        }
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub ollama_host: String,
    pub ollama_model: String,
    #[serde(default)]
    pub options: GenerationOptions,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            ollama_host: "http://localhost:11434".to_string(),
            ollama_model: "llama3.2:latest".to_string(),
            options: GenerationOptions::default(),
        }
    }
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Generate narrative text from a grounded prompt. Errors are fatal
    /// upstream and drive the pipeline to `Failed`.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> SarResult<String>;
}

/// Ollama-backed generator (`POST /api/generate`, non-streaming).
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f64,
    num_predict: u32,
    top_p: f64,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

impl OllamaGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        OllamaGenerator {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.ollama_host.clone(), config.ollama_model.clone())
    }
}

#[async_trait]
impl NarrativeGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> SarResult<String> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
                top_p: 0.9,
            },
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!(host = %self.base_url, "generation backend unreachable: {e}");
                SarError::unavailable("generation", e.to_string())
            })?
            .error_for_status()
            .map_err(|e| SarError::unavailable("generation", e.to_string()))?;

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| SarError::unavailable("generation", e.to_string()))?;

        let narrative = body.response.trim().to_string();
        if narrative.is_empty() {
            return Err(SarError::unavailable(
                "generation",
                "empty response from model",
            ));
        }

        info!(chars = narrative.len(), "narrative generated");
        Ok(narrative)
    }
}

/// Generator returning a fixed, pre-rendered narrative. Backs tests and the
/// CLI's offline mode (paired with [`render_offline_narrative`]).
pub struct CannedGenerator {
    text: String,
}

impl CannedGenerator {
    pub fn new(text: impl Into<String>) -> Self {
        CannedGenerator { text: text.into() }
    }
}

#[async_trait]
impl NarrativeGenerator for CannedGenerator {
    async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> SarResult<String> {
        Ok(self.text.clone())
    }
}

/// Render a compliant narrative purely from case data — no model involved.
/// Every amount it mentions comes from the source transaction set (or its
/// total), so the output passes amount validation by construction.
pub fn render_offline_narrative(
    case: &CaseContext,
    patterns: &PatternResult,
    profile: &JurisdictionProfile,
) -> String {
    let customer = &case.customer;
    let c = profile.currency_symbol;
    let transactions = &case.transactions;

    let period = match (
        transactions.iter().map(|t| t.timestamp).min(),
        transactions.iter().map(|t| t.timestamp).max(),
    ) {
        (Some(start), Some(end)) => format!(
            "between {} and {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        ),
        _ => "during the review period".to_string(),
    };

    let typologies = patterns
        .typologies
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ");

    let largest = transactions
        .iter()
        .max_by(|a, b| a.amount.partial_cmp(&b.amount).unwrap_or(std::cmp::Ordering::Equal));
    let largest_line = match largest {
        Some(txn) => format!(
            "The largest single transaction of {c}{} (ref {}) moved from account {} to account {}. ",
            format_amount(txn.amount),
            txn.short_id(),
            txn.source_account,
            txn.destination_account
        ),
        None => String::new(),
    };

    format!(
        "Subject Information: {name}, holder of account {account}, was reviewed following \
automated transaction monitoring alerts escalated for analyst attention. The customer \
profile, stated occupation and declared income on record were considered alongside the \
observed account behaviour when forming this assessment.\n\n\
Suspicious Activity Description: {period_cap}, the account was party to {count} \
transactions aggregating {c}{total}. The velocity of movement covered a span of \
{span} days at approximately {per_day} transactions per day, which the monitoring \
programme classifies as {risk:?} risk. {near} of the observed transactions fell within \
the band immediately below the applicable reporting threshold, a distribution \
consistent with deliberate structuring of deposits to avoid mandatory reporting. \
{largest_line}\n\n\
Supporting Evidence: the transaction network comprised {sources} distinct source \
accounts and {destinations} distinct destination accounts. The detected typologies \
for this activity are: {typologies}. All figures cited in this report are drawn \
directly from the underlying transaction records held by the institution.\n\n\
Analyst Assessment: the composite risk score for this activity is {score}/10. The \
pattern of activity described above is regarded as suspicious and inconsistent with \
the customer's known profile, and this report is submitted to the {body} for \
consideration under {law}.",
        name = customer.name,
        account = customer.account_number,
        period_cap = period,
        count = transactions.len(),
        total = format_amount(patterns.volume.total),
        span = patterns.velocity.span_days,
        per_day = patterns.velocity.per_day,
        risk = patterns.velocity.risk,
        near = patterns.structuring.near_threshold_count,
        largest_line = largest_line,
        sources = patterns.network.unique_sources,
        destinations = patterns.network.unique_destinations,
        typologies = typologies,
        score = patterns.risk_score,
        body = profile.regulatory_body,
        law = profile.legal_terminology,
    )
}
