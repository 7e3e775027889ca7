//! Domain records for one analysis case: the customer under review and the
//! transactions associated with the generation request.
//!
//! All three types are plain immutable data. A [`CaseContext`] is created per
//! request, owned by exactly one pipeline instance, and discarded after the
//! run.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single financial transaction, immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "transaction_id")]
    pub id: Uuid,
    pub amount: f64,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    pub source_account: String,
    pub destination_account: String,
    #[serde(rename = "transaction_type")]
    pub kind: String,
}

impl Transaction {
    /// Short id form used when rendering transactions into prompts and
    /// narratives (first eight hex digits of the uuid).
    pub fn short_id(&self) -> String {
        self.id.to_string().chars().take(8).collect()
    }
}

/// The customer a case concerns, with KYC metadata. Immutable within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "customer_id")]
    pub id: Uuid,
    pub name: String,
    pub account_number: String,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub stated_income: Option<f64>,
    #[serde(default)]
    pub customer_since: Option<NaiveDate>,
}

/// One customer plus its transaction set for a single generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseContext {
    pub case_id: String,
    pub customer: Customer,
    pub transactions: Vec<Transaction>,
}

impl CaseContext {
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}
