//! Case data collaborator: where the pipeline fetches a customer and its
//! transactions from. The store behind it is out of core scope; the core only
//! consumes this trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

use crate::case::CaseContext;
use crate::errors::{SarError, SarResult};

#[async_trait]
pub trait CaseSource: Send + Sync {
    /// Fetch the case context for `case_id`. Unknown ids fail with
    /// [`SarError::NotFound`].
    async fn fetch(&self, case_id: &str) -> SarResult<CaseContext>;
}

/// In-memory case source backed by JSON fixtures. Used by the CLI and tests;
/// a database-backed implementation lives behind the same trait.
#[derive(Default)]
pub struct InMemoryCaseSource {
    cases: HashMap<String, CaseContext>,
}

impl InMemoryCaseSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, case: CaseContext) {
        self.cases.insert(case.case_id.clone(), case);
    }

    /// Load cases from a JSON file holding either a single case object or an
    /// array of them.
    pub fn from_json_file(path: &Path) -> SarResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| SarError::persistence(format!("read {}", path.display()), e))?;

        let cases: Vec<CaseContext> = match serde_json::from_str::<Vec<CaseContext>>(&raw) {
            Ok(list) => list,
            Err(_) => vec![serde_json::from_str::<CaseContext>(&raw)
                .map_err(|e| SarError::serialization("case fixture", e))?],
        };

        let mut source = Self::new();
        for case in cases {
            source.insert(case);
        }
        Ok(source)
    }

    pub fn case_ids(&self) -> Vec<&str> {
        self.cases.keys().map(String::as_str).collect()
    }
}

#[async_trait]
impl CaseSource for InMemoryCaseSource {
    async fn fetch(&self, case_id: &str) -> SarResult<CaseContext> {
        self.cases
            .get(case_id)
            .cloned()
            .ok_or_else(|| SarError::not_found("case", case_id))
    }
}
