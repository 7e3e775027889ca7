// sarforge - main.rs
// Binary glue only: parse the CLI, wire the collaborators, print results.

use anyhow::{bail, Context};
use clap::Parser;
use std::process::exit;
use std::sync::Arc;

use sarforge::audit_store_sled::SledAuditStore;
use sarforge::cli::{Cli, Commands};
use sarforge::config_loader::load_config;
use sarforge::data_source::{CaseSource, InMemoryCaseSource};
use sarforge::engine::SarEngine;
use sarforge::generation::{
    render_offline_narrative, CannedGenerator, NarrativeGenerator, OllamaGenerator,
};
use sarforge::jurisdiction;
use sarforge::pattern_detector::PatternDetector;
use sarforge::retrieval::StaticTemplateRetriever;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();
    let config = load_config().context("failed to load configuration")?;
    let store = Arc::new(
        SledAuditStore::open(&config.store_path).context("failed to open audit store")?,
    );

    match cli.command {
        Commands::Generate {
            cases,
            case_id,
            offline,
        } => {
            let source =
                InMemoryCaseSource::from_json_file(&cases).context("failed to load case file")?;

            let case_id = match case_id {
                Some(id) => id,
                None => {
                    let ids = source.case_ids();
                    match ids.as_slice() {
                        [only] => only.to_string(),
                        _ => bail!(
                            "case file holds {} cases; pick one with --case-id",
                            ids.len()
                        ),
                    }
                }
            };

            let generator: Arc<dyn NarrativeGenerator> = if offline {
                // Deterministic dry run: render from case data, no model call.
                let case = source.fetch(&case_id).await?;
                let patterns = PatternDetector::new(config.detection.clone()).detect(&case);
                let profile = jurisdiction::profile(&config.pipeline.jurisdiction);
                Arc::new(CannedGenerator::new(render_offline_narrative(
                    &case, &patterns, &profile,
                )))
            } else {
                Arc::new(OllamaGenerator::from_config(&config.generation))
            };

            let engine = SarEngine::new(
                Arc::new(source),
                Arc::new(StaticTemplateRetriever::builtin()),
                generator,
                store,
                config,
            );

            let outcome = engine.generate(&case_id).await?;
            println!("narrative_id: {}", outcome.narrative_id);
            println!("risk_score: {}", outcome.risk_score);
            println!(
                "typologies: {}",
                outcome
                    .typologies
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("audit_steps: {}", outcome.audit_step_count);
            println!("duration_ms: {}", outcome.duration.as_millis());
            println!("\n{}", outcome.narrative_text);
        }

        Commands::Show { narrative_id } => {
            let engine = engine_without_collaborators(store, config);
            match engine.narrative(&narrative_id)? {
                Some(narrative) => {
                    println!("status: {:?}", narrative.status);
                    println!("case_id: {}", narrative.case_id);
                    println!("generated_at: {}", narrative.generated_at);
                    println!("\n{}", narrative.text);
                }
                None => bail!("narrative {narrative_id} not found"),
            }
        }

        Commands::Audit { narrative_id } => {
            let engine = engine_without_collaborators(store, config);
            let report = engine.get_audit(&narrative_id)?;
            println!("chain_valid: {}", report.chain_valid);
            for (i, step) in report.steps.iter().enumerate() {
                println!(
                    "[{i}] {} confidence={} hash={}...",
                    step.step_name,
                    step.confidence,
                    &step.current_hash[..16]
                );
            }
            println!(
                "attributed_sentences: {}",
                report
                    .sentence_attribution
                    .iter()
                    .filter(|s| s.has_reference)
                    .count()
            );
        }

        Commands::Verify { narrative_id } => {
            let engine = engine_without_collaborators(store, config);
            let report = engine.get_audit(&narrative_id)?;
            if report.chain_valid {
                println!("chain valid ({} records)", report.steps.len());
            } else {
                eprintln!("chain INVALID");
                exit(1);
            }
        }

        Commands::Approve {
            narrative_id,
            analyst,
        } => {
            let engine = engine_without_collaborators(store, config);
            engine.approve(&narrative_id, &analyst)?;
            println!("narrative {narrative_id} approved by {analyst}");
        }

        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("failed to render configuration")?;
            println!("{rendered}");
        }
    }

    Ok(())
}

/// Read-side commands never invoke the collaborators; empty stand-ins keep
/// the engine construction uniform.
fn engine_without_collaborators(
    store: Arc<SledAuditStore>,
    config: sarforge::config_loader::SarConfig,
) -> SarEngine {
    SarEngine::new(
        Arc::new(InMemoryCaseSource::new()),
        Arc::new(StaticTemplateRetriever::builtin()),
        Arc::new(CannedGenerator::new(String::new())),
        store,
        config,
    )
}
