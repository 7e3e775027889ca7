//! The exposed core interface, consumed by an API or CLI layer (out of core
//! scope): run a generation for a case, read back the audit trail with its
//! chain verdict, and apply the explicit external approval action.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::attribution::SentenceAttribution;
use crate::audit_store::AuditStore;
use crate::config_loader::SarConfig;
use crate::data_source::CaseSource;
use crate::errors::{SarError, SarResult};
use crate::generation::NarrativeGenerator;
use crate::ledger::{self, AuditRecord};
use crate::narrative::{Narrative, NarrativeStatus};
use crate::pattern_detector::PatternDetector;
use crate::pipeline::{CancellationFlag, PipelineOrchestrator, PipelineOutcome};
use crate::retrieval::TemplateRetriever;
use crate::validator::NarrativeValidator;

/// Audit trail read-back: chain validity is recomputed on every read, never
/// trusted from storage.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub narrative_id: Uuid,
    pub chain_valid: bool,
    pub steps: Vec<AuditRecord>,
    pub sentence_attribution: Vec<SentenceAttribution>,
}

pub struct SarEngine {
    case_source: Arc<dyn CaseSource>,
    retriever: Arc<dyn TemplateRetriever>,
    generator: Arc<dyn NarrativeGenerator>,
    store: Arc<dyn AuditStore>,
    config: SarConfig,
}

impl SarEngine {
    pub fn new(
        case_source: Arc<dyn CaseSource>,
        retriever: Arc<dyn TemplateRetriever>,
        generator: Arc<dyn NarrativeGenerator>,
        store: Arc<dyn AuditStore>,
        config: SarConfig,
    ) -> Self {
        SarEngine {
            case_source,
            retriever,
            generator,
            store,
            config,
        }
    }

    /// Run the full pipeline for one case. Each call is an independent
    /// pipeline instance; concurrent calls for distinct cases share nothing
    /// mutable beyond the partitioned audit store.
    pub async fn generate(&self, case_id: &str) -> SarResult<PipelineOutcome> {
        self.generate_with_cancellation(case_id, CancellationFlag::new())
            .await
    }

    pub async fn generate_with_cancellation(
        &self,
        case_id: &str,
        cancel: CancellationFlag,
    ) -> SarResult<PipelineOutcome> {
        let orchestrator = PipelineOrchestrator::new(
            self.case_source.as_ref(),
            self.retriever.as_ref(),
            self.generator.as_ref(),
            self.store.as_ref(),
            PatternDetector::new(self.config.detection.clone()),
            NarrativeValidator::new(self.config.validation.clone()),
            self.config.pipeline.clone(),
            self.config.generation.options.clone(),
        )
        .with_cancellation(cancel);

        orchestrator.run(case_id).await
    }

    /// Load and re-verify the audit trail for a narrative.
    pub fn get_audit(&self, narrative_id: &Uuid) -> SarResult<AuditReport> {
        let steps = self.store.load_audit(narrative_id)?;
        if steps.is_empty() {
            return Err(SarError::not_found("audit trail", narrative_id.to_string()));
        }

        let chain_valid = ledger::verify_chain(&steps).is_ok();

        let sentence_attribution = steps
            .last()
            .and_then(|record| record.data_sources.get("sentence_attribution"))
            .cloned()
            .map(serde_json::from_value::<Vec<SentenceAttribution>>)
            .transpose()
            .map_err(|e| SarError::serialization("sentence attribution", e))?
            .unwrap_or_default();

        Ok(AuditReport {
            narrative_id: *narrative_id,
            chain_valid,
            steps,
            sentence_attribution,
        })
    }

    pub fn narrative(&self, narrative_id: &Uuid) -> SarResult<Option<Narrative>> {
        self.store.load_narrative(narrative_id)
    }

    /// The explicit external approval action: Validated → Approved, status
    /// only, content untouched.
    pub fn approve(&self, narrative_id: &Uuid, analyst: &str) -> SarResult<()> {
        let mut narrative = self
            .store
            .load_narrative(narrative_id)?
            .ok_or_else(|| SarError::not_found("narrative", narrative_id.to_string()))?;

        narrative.mark_approved()?;
        self.store
            .update_narrative_status(narrative_id, NarrativeStatus::Approved)?;

        info!(%narrative_id, analyst, "narrative approved");
        Ok(())
    }
}
