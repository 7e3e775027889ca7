//! Pipeline orchestrator: the state machine that turns a case id into a
//! validated, fully audited narrative.
//!
//! States run in strict order — Fetching → Analyzing → Retrieving →
//! Generating → Validating → Saving → Completed — with Failed reachable from
//! every non-terminal state. Each transition does its work against typed
//! stage outputs (no shared mutable blob), appends exactly one audit record
//! (also on failure, carrying the reason), and either advances or halts. The
//! first failure halts the machine; there are no retries at this layer.
//!
//! Only the two collaborator calls may suspend, and both sit under a
//! configurable timeout. Retrieval degrades to an empty template list on
//! failure; generation failure is fatal (fail-closed, like validation).
//! Cancellation is cooperative and checked only between stages; a cancelled
//! run still appends a terminal audit entry.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::attribution;
use crate::audit_store::AuditStore;
use crate::data_source::CaseSource;
use crate::errors::{reason, SarError, SarResult};
use crate::generation::{GenerationOptions, NarrativeGenerator};
use crate::jurisdiction;
use crate::ledger::HashChainLedger;
use crate::narrative::Narrative;
use crate::pattern_detector::{PatternDetector, Typology};
use crate::prompt;
use crate::retrieval::TemplateRetriever;
use crate::typology_context::AdvisoryRegistry;
use crate::validator::NarrativeValidator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Fetching,
    Analyzing,
    Retrieving,
    Generating,
    Validating,
    Saving,
    Completed,
    Failed,
}

/// Orchestration settings. Generation is the long pole, hence the
/// minutes-scale default timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub retrieval_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    /// Templates requested from the retrieval collaborator.
    pub template_count: usize,
    pub jurisdiction: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            retrieval_timeout_secs: 10,
            generation_timeout_secs: 120,
            template_count: 3,
            jurisdiction: "IN".to_string(),
        }
    }
}

/// What a completed run hands back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub narrative_id: Uuid,
    pub narrative_text: String,
    pub risk_score: f64,
    pub typologies: Vec<Typology>,
    pub audit_step_count: usize,
    pub duration: Duration,
}

/// Cooperative cancellation handle, checked between stages only — an
/// in-flight stage completes or times out before cancellation takes effect.
#[derive(Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One pipeline instance processes one case sequentially and owns its ledger,
/// making hash-chain append single-writer by construction.
pub struct PipelineOrchestrator<'a> {
    case_source: &'a dyn CaseSource,
    retriever: &'a dyn TemplateRetriever,
    generator: &'a dyn NarrativeGenerator,
    store: &'a dyn AuditStore,
    detector: PatternDetector,
    validator: NarrativeValidator,
    registry: AdvisoryRegistry,
    config: PipelineConfig,
    options: GenerationOptions,
    cancel: CancellationFlag,
    state: PipelineState,
    ledger: HashChainLedger,
    narrative_id: Uuid,
}

impl<'a> PipelineOrchestrator<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        case_source: &'a dyn CaseSource,
        retriever: &'a dyn TemplateRetriever,
        generator: &'a dyn NarrativeGenerator,
        store: &'a dyn AuditStore,
        detector: PatternDetector,
        validator: NarrativeValidator,
        config: PipelineConfig,
        options: GenerationOptions,
    ) -> Self {
        PipelineOrchestrator {
            case_source,
            retriever,
            generator,
            store,
            detector,
            validator,
            registry: AdvisoryRegistry::builtin(),
            config,
            options,
            cancel: CancellationFlag::new(),
            state: PipelineState::Fetching,
            ledger: HashChainLedger::new(),
            // Allocated up front so failed runs still have an addressable
            // audit partition.
            narrative_id: Uuid::new_v4(),
        }
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn narrative_id(&self) -> Uuid {
        self.narrative_id
    }

    /// Run the full state machine for `case_id`. Consumes the instance:
    /// terminal states are absorbing.
    pub async fn run(mut self, case_id: &str) -> SarResult<PipelineOutcome> {
        let result = self.execute(case_id).await;

        if let Err(err) = &result {
            if self.state != PipelineState::Failed {
                // An error escaped a stage without being audited there; the
                // top-level handler still guarantees a failure record.
                if let Err(audit_err) = self.audit_step(
                    "pipeline_error",
                    json!({"pipeline": "orchestrator"}),
                    json!({"state": self.state, "error": err.to_string()}),
                    0.0,
                ) {
                    error!(%audit_err, "failed to append top-level failure record");
                }
                self.state = PipelineState::Failed;
            }
        }

        result
    }

    async fn execute(&mut self, case_id: &str) -> SarResult<PipelineOutcome> {
        let started = Instant::now();
        info!(case_id, narrative_id = %self.narrative_id, "pipeline started");

        // FETCHING
        self.state = PipelineState::Fetching;
        self.check_cancelled()?;
        let case = match self.case_source.fetch(case_id).await {
            Ok(case) => {
                self.audit_step(
                    "fetch_data",
                    json!({"database": "case_source"}),
                    json!({
                        "customer_name": case.customer.name,
                        "transaction_count": case.transactions.len(),
                    }),
                    1.0,
                )?;
                case
            }
            Err(err) => return Err(self.fail_stage("fetch_data", err)),
        };

        // ANALYZING
        self.state = PipelineState::Analyzing;
        self.check_cancelled()?;
        let patterns = self.detector.detect(&case);
        self.audit_step(
            "analyze_patterns",
            json!({"algorithm": "pattern_detector"}),
            json!({
                "typologies": patterns.typologies,
                "risk_score": patterns.risk_score,
                "structuring_likelihood": patterns.structuring.likelihood,
            }),
            0.9,
        )?;

        // RETRIEVING — failure is non-fatal; degrade to an empty list.
        self.state = PipelineState::Retrieving;
        self.check_cancelled()?;
        let context = self
            .registry
            .typology_context(&patterns.typologies, &self.config.jurisdiction);
        let retrieval = timeout(
            Duration::from_secs(self.config.retrieval_timeout_secs),
            self.retriever
                .retrieve(&patterns.typologies, self.config.template_count),
        )
        .await;
        let (templates, degradation) = match retrieval {
            Ok(Ok(templates)) => (templates, None),
            Ok(Err(err)) => {
                warn!(%err, "template retrieval failed; continuing without templates");
                (Vec::new(), Some(err.to_string()))
            }
            Err(_) => {
                warn!("template retrieval timed out; continuing without templates");
                (
                    Vec::new(),
                    Some(format!(
                        "timed out after {}s",
                        self.config.retrieval_timeout_secs
                    )),
                )
            }
        };
        let mut retrieval_reasoning = json!({
            "templates_found": templates.len(),
            "advisories_matched": context.advisories.len(),
        });
        if let Some(detail) = &degradation {
            retrieval_reasoning["degraded"] = json!(true);
            retrieval_reasoning["detail"] = json!(detail);
        }
        let retrieval_confidence = if degradation.is_some() {
            0.3
        } else {
            context.confidence
        };
        self.audit_step(
            "retrieve_templates",
            json!({"retriever": "template_retriever", "registry": "advisory_registry"}),
            retrieval_reasoning,
            retrieval_confidence,
        )?;

        // GENERATING — failure is fatal.
        self.state = PipelineState::Generating;
        self.check_cancelled()?;
        let profile = jurisdiction::profile(&self.config.jurisdiction);
        let prompt_text =
            prompt::build_generation_prompt(&case, &patterns, &templates, &context, &profile);
        let generation = timeout(
            Duration::from_secs(self.config.generation_timeout_secs),
            self.generator.generate(&prompt_text, &self.options),
        )
        .await;
        let text = match generation {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => return Err(self.fail_stage("generate_narrative", err)),
            Err(_) => {
                let err = SarError::unavailable(
                    "generation",
                    format!(
                        "timed out after {}s",
                        self.config.generation_timeout_secs
                    ),
                );
                return Err(self.fail_stage("generate_narrative", err));
            }
        };
        let mut narrative = Narrative::draft(self.narrative_id, case_id, text);
        self.audit_step(
            "generate_narrative",
            json!({"generator": "narrative_generator"}),
            json!({
                "narrative_length": narrative.text.len(),
                "prompt_length": prompt_text.len(),
                "templates_used": templates.len(),
            }),
            0.85,
        )?;

        // VALIDATING — fail-closed: an unvalidated narrative is never saved.
        self.state = PipelineState::Validating;
        self.check_cancelled()?;
        let structure = self
            .validator
            .validate_structure(&narrative.text, &case.customer);
        let amounts = self
            .validator
            .validate_amounts(&narrative.text, &case.transactions);
        let valid = structure.passed && amounts.passed;
        self.audit_step(
            "validate_narrative",
            json!({"validator": "rule_based"}),
            json!({
                "valid": valid,
                "structure_failures": structure.failures,
                "amount_failures": amounts.failures,
                "word_count": narrative.text.split_whitespace().count(),
            }),
            if valid { 0.95 } else { 0.5 },
        )?;
        if !structure.passed {
            let err =
                SarError::validation(reason::STRUCTURE_INVALID, structure.failures.join("; "));
            return Err(self.halt(err));
        }
        if !amounts.passed {
            let err = SarError::validation(
                reason::HALLUCINATION_DETECTED,
                amounts.failures.join("; "),
            );
            return Err(self.halt(err));
        }
        narrative.mark_validated()?;

        // SAVING
        self.state = PipelineState::Saving;
        self.check_cancelled()?;
        narrative.generation_seconds = started.elapsed().as_secs();
        let attribution =
            attribution::attribute(&narrative.text, &case.transactions, &case.customer);
        if let Err(err) = self.store.save_narrative(&narrative) {
            return Err(self.fail_stage("save_results", err));
        }
        let attribution_value = serde_json::to_value(&attribution)
            .map_err(|e| SarError::serialization("sentence attribution", e))?;
        self.audit_step(
            "save_results",
            json!({
                "persistence": "audit_store",
                "sentence_attribution": attribution_value,
            }),
            json!({
                "narrative_id": self.narrative_id.to_string(),
                "sentences": attribution.len(),
            }),
            1.0,
        )?;

        self.state = PipelineState::Completed;
        let duration = started.elapsed();
        info!(
            narrative_id = %self.narrative_id,
            risk_score = patterns.risk_score,
            audit_steps = self.ledger.len(),
            elapsed_ms = duration.as_millis() as u64,
            "pipeline completed"
        );

        Ok(PipelineOutcome {
            narrative_id: self.narrative_id,
            narrative_text: narrative.text.clone(),
            risk_score: patterns.risk_score,
            typologies: patterns.typologies.clone(),
            audit_step_count: self.ledger.len(),
            duration,
        })
    }

    /// Append one audit record to the in-memory chain and persist it
    /// immediately, so partial runs leave a complete trail.
    fn audit_step(
        &mut self,
        step_name: &str,
        data_sources: Value,
        reasoning: Value,
        confidence: f64,
    ) -> SarResult<()> {
        self.ledger
            .append(step_name, as_map(data_sources), as_map(reasoning), confidence)?;
        let seq = self.ledger.len() - 1;
        let record = &self.ledger.records()[seq];
        self.store.append_audit(&self.narrative_id, seq, record)
    }

    /// Record a stage failure in the stage's own audit record and halt.
    fn fail_stage(&mut self, step_name: &str, err: SarError) -> SarError {
        error!(stage = step_name, %err, "pipeline stage failed");
        if let Err(audit_err) = self.audit_step(
            step_name,
            json!({"pipeline": "orchestrator"}),
            json!({"error": err.to_string(), "state": self.state}),
            0.0,
        ) {
            error!(%audit_err, "failed to append failure audit record");
        }
        self.state = PipelineState::Failed;
        err
    }

    /// Halt after a stage whose audit record already carries the failure
    /// detail (the fail-closed validation path).
    fn halt(&mut self, err: SarError) -> SarError {
        error!(%err, "pipeline halted");
        self.state = PipelineState::Failed;
        err
    }

    fn check_cancelled(&mut self) -> SarResult<()> {
        if !self.cancel.is_cancelled() {
            return Ok(());
        }

        let stage = format!("{:?}", self.state).to_lowercase();
        warn!(stage = %stage, "pipeline cancelled");
        self.audit_step(
            "cancelled",
            json!({"pipeline": "orchestrator"}),
            json!({"state": self.state, "reason": reason::CANCELLED}),
            0.0,
        )?;
        self.state = PipelineState::Failed;
        Err(SarError::cancelled(stage))
    }
}

fn as_map(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
