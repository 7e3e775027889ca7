//! Generated narrative record and its status lifecycle.
//!
//! Content is immutable after creation. Status moves strictly
//! Draft → Validated → Approved: Draft → Validated only after both validator
//! checks pass, Validated → Approved only through the explicit external
//! approval action. Approval changes the status field, never the text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{SarError, SarResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeStatus {
    Draft,
    Validated,
    Approved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    #[serde(rename = "narrative_id")]
    pub id: Uuid,
    pub case_id: String,
    pub text: String,
    pub status: NarrativeStatus,
    pub generated_at: DateTime<Utc>,
    pub generation_seconds: u64,
}

impl Narrative {
    pub fn draft(id: Uuid, case_id: impl Into<String>, text: impl Into<String>) -> Self {
        Narrative {
            id,
            case_id: case_id.into(),
            text: text.into(),
            status: NarrativeStatus::Draft,
            generated_at: Utc::now(),
            generation_seconds: 0,
        }
    }

    pub fn mark_validated(&mut self) -> SarResult<()> {
        match self.status {
            NarrativeStatus::Draft => {
                self.status = NarrativeStatus::Validated;
                Ok(())
            }
            other => Err(SarError::internal(format!(
                "narrative {} cannot transition {:?} -> validated",
                self.id, other
            ))),
        }
    }

    pub fn mark_approved(&mut self) -> SarResult<()> {
        match self.status {
            NarrativeStatus::Validated => {
                self.status = NarrativeStatus::Approved;
                Ok(())
            }
            other => Err(SarError::internal(format!(
                "narrative {} cannot transition {:?} -> approved",
                self.id, other
            ))),
        }
    }
}
