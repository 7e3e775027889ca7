//! Template retrieval collaborator.
//!
//! Retrieval failure is non-fatal for the pipeline: the orchestrator degrades
//! to an empty template list and records the degradation in the audit trail.

use async_trait::async_trait;

use crate::errors::SarResult;
use crate::pattern_detector::Typology;

#[async_trait]
pub trait TemplateRetriever: Send + Sync {
    /// Retrieve up to `k` reference templates relevant to the detected
    /// typologies, most relevant first.
    async fn retrieve(&self, typologies: &[Typology], k: usize) -> SarResult<Vec<String>>;
}

/// Built-in retriever serving static regulatory template snippets keyed by
/// typology. Stands in for a vector-store backend behind the same trait.
pub struct StaticTemplateRetriever {
    templates: Vec<(Typology, String)>,
    fallback: String,
}

impl StaticTemplateRetriever {
    pub fn builtin() -> Self {
        let templates = vec![
            (
                Typology::Structuring,
                "Structuring template: describe the count and band of sub-threshold \
                 transactions, the applicable reporting threshold, and the period over \
                 which the pattern persisted."
                    .to_string(),
            ),
            (
                Typology::Layering,
                "Layering template: trace the movement of funds across accounts in \
                 chronological order, naming each intermediary account and the elapsed \
                 time between hops."
                    .to_string(),
            ),
            (
                Typology::Smurfing,
                "Smurfing template: enumerate the distinct remitting counterparties, \
                 the receiving account, and the aggregate credited amount."
                    .to_string(),
            ),
            (
                Typology::Integration,
                "Integration template: connect the accumulated funds to their re-entry \
                 point and state the total integrated within the observation window."
                    .to_string(),
            ),
            (
                Typology::RoundTripping,
                "Round-tripping template: describe the circular flow, the originating \
                 account, and the net position after the cycle completed."
                    .to_string(),
            ),
            (
                Typology::FunnelAccount,
                "Funnel account template: identify the concentrating account, its \
                 counterparty fan-in, and the onward disposition of funds."
                    .to_string(),
            ),
        ];

        StaticTemplateRetriever {
            templates,
            fallback: "General template: state the subject, the observed activity, the \
                       period, the aggregate amounts, and the grounds for suspicion."
                .to_string(),
        }
    }
}

#[async_trait]
impl TemplateRetriever for StaticTemplateRetriever {
    async fn retrieve(&self, typologies: &[Typology], k: usize) -> SarResult<Vec<String>> {
        let mut matched: Vec<String> = self
            .templates
            .iter()
            .filter(|(typology, _)| typologies.contains(typology))
            .map(|(_, template)| template.clone())
            .collect();

        if matched.is_empty() {
            matched.push(self.fallback.clone());
        }

        matched.truncate(k);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_retrieve_matches_typologies() {
        let retriever = StaticTemplateRetriever::builtin();
        let templates = retriever
            .retrieve(&[Typology::Structuring, Typology::Layering], 5)
            .await
            .unwrap();
        assert_eq!(templates.len(), 2);
        assert!(templates[0].contains("Structuring template"));
    }

    #[tokio::test]
    async fn test_retrieve_caps_at_k() {
        let retriever = StaticTemplateRetriever::builtin();
        let templates = retriever
            .retrieve(&[Typology::Structuring, Typology::Layering], 1)
            .await
            .unwrap();
        assert_eq!(templates.len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_typology_gets_fallback() {
        let retriever = StaticTemplateRetriever::builtin();
        let templates = retriever
            .retrieve(&[Typology::GeneralSuspicious], 3)
            .await
            .unwrap();
        assert_eq!(templates.len(), 1);
        assert!(templates[0].contains("General template"));
    }
}
