use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

/// Top-level CLI interface for sarforge
#[derive(Parser)]
#[command(
    name = "sarforge",
    version = "0.1.0",
    about = "SAR analysis-and-audit pipeline CLI"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline for a case loaded from a JSON fixture file
    Generate {
        /// Path to the case fixture (single case object or an array)
        #[arg(short, long)]
        cases: PathBuf,
        /// Case id to process; defaults to the only case in the file
        #[arg(short = 'i', long)]
        case_id: Option<String>,
        /// Render the narrative offline instead of calling the model backend
        #[arg(long)]
        offline: bool,
    },

    /// Show a stored narrative
    Show {
        narrative_id: Uuid,
    },

    /// Print the audit trail for a narrative, with chain verification
    Audit {
        narrative_id: Uuid,
    },

    /// Verify the hash chain only (exit non-zero on integrity fault)
    Verify {
        narrative_id: Uuid,
    },

    /// Approve a validated narrative
    Approve {
        narrative_id: Uuid,
        #[arg(short, long)]
        analyst: String,
    },

    /// Print the effective configuration (defaults + sarforge.toml + env)
    Config,
}
