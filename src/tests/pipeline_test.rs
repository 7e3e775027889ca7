//! State machine tests: happy path, degradation, fail-closed halts,
//! timeouts, and cancellation — all against stub collaborators and a real
//! sled-backed store.

use std::sync::Arc;

use crate::audit_store::AuditStore;
use crate::config_loader::SarConfig;
use crate::data_source::InMemoryCaseSource;
use crate::engine::SarEngine;
use crate::errors::{reason, SarError};
use crate::generation::{render_offline_narrative, CannedGenerator, GenerationOptions};
use crate::jurisdiction;
use crate::ledger;
use crate::narrative::NarrativeStatus;
use crate::pattern_detector::{DetectionConfig, PatternDetector, Typology};
use crate::pipeline::{CancellationFlag, PipelineConfig, PipelineOrchestrator};
use crate::retrieval::StaticTemplateRetriever;
use crate::validator::NarrativeValidator;

use super::test_utils::{
    sled_store, structured_case, transaction, FailingGenerator, FailingRetriever, SlowGenerator,
};

fn offline_narrative_for(case: &crate::case::CaseContext) -> String {
    let patterns = PatternDetector::new(DetectionConfig::default()).detect(case);
    render_offline_narrative(case, &patterns, &jurisdiction::profile("IN"))
}

#[tokio::test]
async fn test_end_to_end_structured_case() {
    let case = structured_case();
    let narrative_text = offline_narrative_for(&case);
    let (_dir, store) = sled_store();

    let mut source = InMemoryCaseSource::new();
    source.insert(case);

    let engine = SarEngine::new(
        Arc::new(source),
        Arc::new(StaticTemplateRetriever::builtin()),
        Arc::new(CannedGenerator::new(narrative_text)),
        store,
        SarConfig::default(),
    );

    let outcome = engine.generate("case-structured").await.unwrap();

    assert!(outcome.risk_score > 5.0);
    assert!(outcome.typologies.contains(&Typology::Structuring));
    assert!(outcome.typologies.contains(&Typology::Layering));
    assert_eq!(outcome.audit_step_count, 6);

    let report = engine.get_audit(&outcome.narrative_id).unwrap();
    assert!(report.chain_valid);
    let step_names: Vec<&str> = report.steps.iter().map(|s| s.step_name.as_str()).collect();
    assert_eq!(
        step_names,
        [
            "fetch_data",
            "analyze_patterns",
            "retrieve_templates",
            "generate_narrative",
            "validate_narrative",
            "save_results"
        ]
    );
    assert!(report
        .sentence_attribution
        .iter()
        .any(|sentence| sentence.has_reference));

    let narrative = engine.narrative(&outcome.narrative_id).unwrap().unwrap();
    assert_eq!(narrative.status, NarrativeStatus::Validated);

    engine.approve(&outcome.narrative_id, "analyst-1").unwrap();
    let approved = engine.narrative(&outcome.narrative_id).unwrap().unwrap();
    assert_eq!(approved.status, NarrativeStatus::Approved);
    assert_eq!(approved.text, narrative.text);
}

#[tokio::test]
async fn test_retrieval_failure_degrades_gracefully() {
    let case = structured_case();
    let narrative_text = offline_narrative_for(&case);
    let (_dir, store) = sled_store();

    let mut source = InMemoryCaseSource::new();
    source.insert(case);

    let engine = SarEngine::new(
        Arc::new(source),
        Arc::new(FailingRetriever),
        Arc::new(CannedGenerator::new(narrative_text)),
        store,
        SarConfig::default(),
    );

    let outcome = engine.generate("case-structured").await.unwrap();

    let report = engine.get_audit(&outcome.narrative_id).unwrap();
    let retrieval_step = report
        .steps
        .iter()
        .find(|s| s.step_name == "retrieve_templates")
        .unwrap();
    assert_eq!(retrieval_step.reasoning["degraded"], serde_json::json!(true));
    assert_eq!(retrieval_step.reasoning["templates_found"], serde_json::json!(0));
    assert_eq!(retrieval_step.confidence, 0.3);
}

#[tokio::test]
async fn test_generation_failure_is_fatal_and_audited() {
    let case = structured_case();
    let (_dir, store) = sled_store();

    let mut source = InMemoryCaseSource::new();
    source.insert(case);
    let retriever = StaticTemplateRetriever::builtin();
    let generator = FailingGenerator;

    let orchestrator = PipelineOrchestrator::new(
        &source,
        &retriever,
        &generator,
        store.as_ref(),
        PatternDetector::new(DetectionConfig::default()),
        NarrativeValidator::new(Default::default()),
        PipelineConfig::default(),
        GenerationOptions::default(),
    );
    let narrative_id = orchestrator.narrative_id();

    let err = orchestrator.run("case-structured").await.unwrap_err();
    assert!(matches!(err, SarError::ExternalUnavailable { .. }));

    // The failure itself is audited, the chain still verifies, and no
    // narrative was persisted.
    let records = store.load_audit(&narrative_id).unwrap();
    let last = records.last().unwrap();
    assert_eq!(last.step_name, "generate_narrative");
    assert_eq!(last.confidence, 0.0);
    assert!(ledger::verify_chain(&records).is_ok());
    assert!(store.load_narrative(&narrative_id).unwrap().is_none());
}

#[tokio::test]
async fn test_generation_timeout_drives_failed() {
    let case = structured_case();
    let (_dir, store) = sled_store();

    let mut source = InMemoryCaseSource::new();
    source.insert(case);
    let retriever = StaticTemplateRetriever::builtin();
    let generator = SlowGenerator { delay_secs: 30 };
    let config = PipelineConfig {
        generation_timeout_secs: 1,
        ..Default::default()
    };

    let orchestrator = PipelineOrchestrator::new(
        &source,
        &retriever,
        &generator,
        store.as_ref(),
        PatternDetector::new(DetectionConfig::default()),
        NarrativeValidator::new(Default::default()),
        config,
        GenerationOptions::default(),
    );
    let narrative_id = orchestrator.narrative_id();

    let err = orchestrator.run("case-structured").await.unwrap_err();
    match err {
        SarError::ExternalUnavailable { collaborator, detail } => {
            assert_eq!(collaborator, "generation");
            assert!(detail.contains("timed out"));
        }
        other => panic!("expected timeout error, got {other:?}"),
    }

    let records = store.load_audit(&narrative_id).unwrap();
    assert_eq!(records.last().unwrap().step_name, "generate_narrative");
}

#[tokio::test]
async fn test_hallucinated_amount_fails_closed() {
    let case = structured_case();
    let mut narrative_text = offline_narrative_for(&case);
    narrative_text.push_str(" A further transfer of ₹75,00,000 was also recorded.");
    let (_dir, store) = sled_store();

    let mut source = InMemoryCaseSource::new();
    source.insert(case);
    let retriever = StaticTemplateRetriever::builtin();
    let generator = CannedGenerator::new(narrative_text);

    let orchestrator = PipelineOrchestrator::new(
        &source,
        &retriever,
        &generator,
        store.as_ref(),
        PatternDetector::new(DetectionConfig::default()),
        NarrativeValidator::new(Default::default()),
        PipelineConfig::default(),
        GenerationOptions::default(),
    );
    let narrative_id = orchestrator.narrative_id();

    let err = orchestrator.run("case-structured").await.unwrap_err();
    match err {
        SarError::Validation { reason: code, detail } => {
            assert_eq!(code, reason::HALLUCINATION_DETECTED);
            assert!(detail.contains("₹75,00,000"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }

    // Fail-closed: the unvalidated narrative must never be persisted.
    assert!(store.load_narrative(&narrative_id).unwrap().is_none());

    let records = store.load_audit(&narrative_id).unwrap();
    let validate_step = records
        .iter()
        .find(|r| r.step_name == "validate_narrative")
        .unwrap();
    assert_eq!(validate_step.reasoning["valid"], serde_json::json!(false));
}

#[tokio::test]
async fn test_structurally_invalid_narrative_fails_closed() {
    let case = structured_case();
    let (_dir, store) = sled_store();

    let mut source = InMemoryCaseSource::new();
    source.insert(case);
    let retriever = StaticTemplateRetriever::builtin();
    let generator = CannedGenerator::new("Too short to be a report.");

    let orchestrator = PipelineOrchestrator::new(
        &source,
        &retriever,
        &generator,
        store.as_ref(),
        PatternDetector::new(DetectionConfig::default()),
        NarrativeValidator::new(Default::default()),
        PipelineConfig::default(),
        GenerationOptions::default(),
    );
    let narrative_id = orchestrator.narrative_id();

    let err = orchestrator.run("case-structured").await.unwrap_err();
    match err {
        SarError::Validation { reason: code, .. } => {
            assert_eq!(code, reason::STRUCTURE_INVALID);
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert!(store.load_narrative(&narrative_id).unwrap().is_none());
}

#[tokio::test]
async fn test_cancellation_appends_terminal_record() {
    let case = structured_case();
    let (_dir, store) = sled_store();

    let mut source = InMemoryCaseSource::new();
    source.insert(case);
    let retriever = StaticTemplateRetriever::builtin();
    let generator = FailingGenerator;

    let flag = CancellationFlag::new();
    flag.cancel();

    let orchestrator = PipelineOrchestrator::new(
        &source,
        &retriever,
        &generator,
        store.as_ref(),
        PatternDetector::new(DetectionConfig::default()),
        NarrativeValidator::new(Default::default()),
        PipelineConfig::default(),
        GenerationOptions::default(),
    )
    .with_cancellation(flag);
    let narrative_id = orchestrator.narrative_id();

    let err = orchestrator.run("case-structured").await.unwrap_err();
    assert!(matches!(err, SarError::Cancelled { .. }));

    let records = store.load_audit(&narrative_id).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].step_name, "cancelled");
}

#[tokio::test]
async fn test_unknown_case_is_not_found() {
    let (_dir, store) = sled_store();
    let engine = SarEngine::new(
        Arc::new(InMemoryCaseSource::new()),
        Arc::new(StaticTemplateRetriever::builtin()),
        Arc::new(CannedGenerator::new(String::new())),
        store,
        SarConfig::default(),
    );

    match engine.generate("missing-case").await {
        Err(SarError::NotFound { id, .. }) => assert_eq!(id, "missing-case"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_transaction_set_completes_with_zero_risk() {
    let case = crate::case::CaseContext {
        case_id: "case-empty".into(),
        customer: super::test_utils::customer(),
        transactions: vec![],
    };
    let narrative_text = offline_narrative_for(&case);
    let (_dir, store) = sled_store();

    let mut source = InMemoryCaseSource::new();
    source.insert(case);

    let engine = SarEngine::new(
        Arc::new(source),
        Arc::new(StaticTemplateRetriever::builtin()),
        Arc::new(CannedGenerator::new(narrative_text)),
        store,
        SarConfig::default(),
    );

    let outcome = engine.generate("case-empty").await.unwrap();
    assert_eq!(outcome.risk_score, 0.0);
    assert!(outcome.typologies.is_empty());
    assert_eq!(outcome.audit_step_count, 6);
}

#[tokio::test]
async fn test_tampering_detected_on_read_back() {
    let case = structured_case();
    let narrative_text = offline_narrative_for(&case);
    let (_dir, store) = sled_store();

    let mut source = InMemoryCaseSource::new();
    source.insert(case.clone());

    let engine = SarEngine::new(
        Arc::new(source),
        Arc::new(StaticTemplateRetriever::builtin()),
        Arc::new(CannedGenerator::new(narrative_text)),
        store.clone(),
        SarConfig::default(),
    );
    let outcome = engine.generate("case-structured").await.unwrap();

    // Retroactively edit a middle record in storage.
    let mut records = store.load_audit(&outcome.narrative_id).unwrap();
    records[2].confidence = 0.01;
    store
        .append_audit(&outcome.narrative_id, 2, &records[2])
        .unwrap();

    let report = engine.get_audit(&outcome.narrative_id).unwrap();
    assert!(!report.chain_valid);
}

#[test]
fn test_single_transaction_case_detects_without_panic() {
    let case = crate::case::CaseContext {
        case_id: "case-single".into(),
        customer: super::test_utils::customer(),
        transactions: vec![transaction(0, 49_500.0, "SRC-1", "ACC-7001")],
    };
    let result = PatternDetector::new(DetectionConfig::default()).detect(&case);
    assert_eq!(result.velocity.span_days, 1);
    assert!(result.risk_score >= 0.0 && result.risk_score <= 10.0);
}
