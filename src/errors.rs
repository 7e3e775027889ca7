//! Error taxonomy for the SAR analysis-and-audit core.
//!
//! Every fallible library path returns [`SarResult`]. The variants mirror the
//! failure classes of the pipeline: missing cases, unavailable collaborators,
//! fail-closed validation rejections, and chain integrity faults — the last of
//! which is kept distinct from business validation because it implies
//! tampering or a defect, not a bad narrative.

use thiserror::Error;

/// Machine-readable reason codes carried by fail-closed validation errors.
pub mod reason {
    pub const STRUCTURE_INVALID: &str = "structure_invalid";
    pub const HALLUCINATION_DETECTED: &str = "hallucination_detected";
    pub const CANCELLED: &str = "cancelled";
}

/// Main error type for the SAR core.
#[derive(Error, Debug)]
pub enum SarError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Resource not found: {resource} - {id}")]
    NotFound { resource: String, id: String },

    #[error("External collaborator unavailable: {collaborator} - {detail}")]
    ExternalUnavailable { collaborator: String, detail: String },

    #[error("Validation failed ({reason}): {detail}")]
    Validation { reason: String, detail: String },

    #[error("Audit chain integrity fault at record {index}: {detail}")]
    ChainIntegrity { index: usize, detail: String },

    #[error("Pipeline cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("Persistence operation failed: {operation}")]
    Persistence {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Shorthand for Result with [`SarError`].
pub type SarResult<T> = Result<T, SarError>;

impl SarError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn unavailable(collaborator: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ExternalUnavailable {
            collaborator: collaborator.into(),
            detail: detail.into(),
        }
    }

    pub fn validation(reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
            detail: detail.into(),
        }
    }

    pub fn chain_integrity(index: usize, detail: impl Into<String>) -> Self {
        Self::ChainIntegrity {
            index,
            detail: detail.into(),
        }
    }

    pub fn persistence(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Persistence {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::Cancelled {
            stage: stage.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for the error kinds the retrieval stage is allowed to absorb.
    pub fn is_degradable(&self) -> bool {
        matches!(self, SarError::ExternalUnavailable { .. })
    }
}

impl From<sled::Error> for SarError {
    fn from(err: sled::Error) -> Self {
        SarError::persistence("sled_operation", err)
    }
}

impl From<serde_json::Error> for SarError {
    fn from(err: serde_json::Error) -> Self {
        SarError::serialization("json_operation", err)
    }
}
