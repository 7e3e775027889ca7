//! Persistence collaborator for audit records and narratives.
//!
//! Both write operations must be atomic: a partially written audit record is
//! never observable. Audit records are append-only and partitioned by
//! narrative id, so concurrent pipeline instances for distinct cases never
//! contend on the same partition. Nothing here mutates a stored record in
//! place — approval updates a narrative's status field only.

use uuid::Uuid;

use crate::errors::SarResult;
use crate::ledger::AuditRecord;
use crate::narrative::{Narrative, NarrativeStatus};

pub trait AuditStore: Send + Sync {
    /// Append one audit record for `narrative_id` at position `seq`.
    fn append_audit(&self, narrative_id: &Uuid, seq: usize, record: &AuditRecord)
        -> SarResult<()>;

    /// Load the ordered audit chain for a narrative. Empty when unknown.
    fn load_audit(&self, narrative_id: &Uuid) -> SarResult<Vec<AuditRecord>>;

    /// Persist a narrative record.
    fn save_narrative(&self, narrative: &Narrative) -> SarResult<()>;

    fn load_narrative(&self, narrative_id: &Uuid) -> SarResult<Option<Narrative>>;

    /// Status-only update used by the external approval action.
    fn update_narrative_status(&self, narrative_id: &Uuid, status: NarrativeStatus)
        -> SarResult<()>;
}
