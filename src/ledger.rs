//! Append-only, hash-linked audit ledger for one pipeline run.
//!
//! Every pipeline step appends exactly one [`AuditRecord`]. Each record's
//! `current_hash` is the SHA-256 of its canonical serialization with the
//! `current_hash` field omitted, and its `previous_hash` is the prior
//! record's `current_hash` (the genesis sentinel for the first record).
//! Undetected retroactive edits are therefore computationally evident:
//! [`verify_chain`] recomputes every hash from stored fields and checks link
//! continuity, reporting the first failing index.
//!
//! The ledger is owned by a single pipeline instance and appended through
//! `&mut self`, which makes the single-writer invariant structural rather
//! than lock-based. Distinct cases use distinct ledgers and never contend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::canonical;
use crate::errors::{SarError, SarResult};

/// Previous-hash sentinel for the first record of a chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One step of the pipeline's tamper-evident trail. Field order is the
/// persisted serde order and must stay stable for interoperability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub step_name: String,
    pub data_sources: Map<String, Value>,
    pub reasoning: Map<String, Value>,
    pub confidence: f64,
    pub previous_hash: String,
    pub current_hash: String,
    pub logged_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Recompute this record's content hash from its stored fields.
    pub fn compute_hash(&self) -> SarResult<String> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| SarError::serialization("audit record", e))?;
        if let Value::Object(ref mut map) = value {
            map.remove("current_hash");
        }
        canonical::hash_canonical(&value)
    }
}

/// In-memory hash chain for one case. Sole mutator of its own tail.
#[derive(Debug, Default)]
pub struct HashChainLedger {
    records: Vec<AuditRecord>,
}

impl HashChainLedger {
    pub fn new() -> Self {
        HashChainLedger {
            records: Vec::new(),
        }
    }

    /// Append a step record, linking it to the current tail and stamping its
    /// content hash.
    pub fn append(
        &mut self,
        step_name: &str,
        data_sources: Map<String, Value>,
        reasoning: Map<String, Value>,
        confidence: f64,
    ) -> SarResult<&AuditRecord> {
        let mut record = AuditRecord {
            step_name: step_name.to_string(),
            data_sources,
            reasoning,
            confidence,
            previous_hash: self.last_hash().to_string(),
            current_hash: String::new(),
            logged_at: Utc::now(),
        };
        record.current_hash = record.compute_hash()?;

        debug!(
            step_name,
            hash = &record.current_hash[..16],
            "audit step appended"
        );

        self.records.push(record);
        Ok(self
            .records
            .last()
            .ok_or_else(|| SarError::internal("ledger append lost its record"))?)
    }

    pub fn last_hash(&self) -> &str {
        self.records
            .last()
            .map(|r| r.current_hash.as_str())
            .unwrap_or(GENESIS_HASH)
    }

    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<AuditRecord> {
        self.records
    }
}

/// Re-verify an ordered record sequence: link continuity and content
/// integrity. Any mismatch invalidates the chain; the error carries the first
/// failing index.
pub fn verify_chain(records: &[AuditRecord]) -> SarResult<()> {
    let mut expected_previous = GENESIS_HASH.to_string();

    for (index, record) in records.iter().enumerate() {
        if record.previous_hash != expected_previous {
            return Err(SarError::chain_integrity(
                index,
                "previous_hash does not match prior record",
            ));
        }

        let recomputed = record.compute_hash()?;
        if recomputed != record.current_hash {
            return Err(SarError::chain_integrity(
                index,
                "current_hash does not match record content",
            ));
        }

        expected_previous = record.current_hash.clone();
    }

    Ok(())
}
