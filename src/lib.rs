//! Library root for the `sarforge` crate: a deterministic analysis-and-audit
//! pipeline that turns a case's financial transactions into a typology
//! classification and risk score, a validated narrative, and a tamper-evident
//! hash-chained audit trail with sentence-level attribution.

// Core error handling
pub mod errors;

// Domain records
pub mod case;
pub mod narrative;

// Detection algorithms
pub mod pattern_detector;
pub mod txn_graph;

// Audit chain & canonical hashing
pub mod canonical;
pub mod ledger;

// Narrative cross-checking
pub mod attribution;
pub mod validator;

// Regulatory grounding
pub mod jurisdiction;
pub mod typology_context;

// Prompt construction
pub mod prompt;

// External collaborators
pub mod audit_store;
pub mod audit_store_sled;
pub mod data_source;
pub mod generation;
pub mod retrieval;

// Orchestration & exposed interface
pub mod engine;
pub mod pipeline;

// Configuration & CLI
pub mod cli;
pub mod config_loader;


// Re-export the types an embedding API layer works with.
pub use attribution::SentenceAttribution;
pub use case::{CaseContext, Customer, Transaction};
pub use engine::{AuditReport, SarEngine};
pub use errors::{SarError, SarResult};
pub use ledger::{verify_chain, AuditRecord, HashChainLedger, GENESIS_HASH};
pub use narrative::{Narrative, NarrativeStatus};
pub use pattern_detector::{PatternResult, Typology};
pub use pipeline::{CancellationFlag, PipelineOutcome, PipelineState};
