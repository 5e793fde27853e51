//! Error types for message contracts

use serde::Serialize;
use thiserror::Error;

use crate::compatibility::IncompatibilityReason;
use crate::envelope::EnvelopeViolation;
use crate::lifecycle::{ContractStatus, LifecycleError};
use crate::types::{ContractId, KafkaTopicId, MessageType};
use crate::version::ContractVersion;

/// Result type for contract operations
pub type Result<T> = std::result::Result<T, ContractError>;

/// Message contract errors
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Invalid schema: {0}")]
    SchemaParse(String),

    #[error("Schema does not declare a constant properties.schemaVersion")]
    MissingSchemaVersion,

    #[error("Invalid schema version {0}: versions start at 1")]
    InvalidSchemaVersion(i64),

    #[error("Invalid version sequence: expected {expected}, got {proposed}")]
    InvalidVersionSequence {
        expected: ContractVersion,
        proposed: ContractVersion,
    },

    #[error("Invalid version sequence: {latest} is the last version, got {proposed}")]
    VersionSequenceExhausted {
        latest: ContractVersion,
        proposed: ContractVersion,
    },

    #[error("Previous contract {version} is {status} and has not been provisioned yet")]
    PreviousContractNotProvisioned {
        version: ContractVersion,
        status: ContractStatus,
    },

    #[error("Invalid message envelope: {0}")]
    Envelope(#[from] EnvelopeViolation),

    #[error("Incompatible schema change: {0}")]
    Incompatible(#[from] IncompatibilityReason),

    #[error("Message contract {id}: {source}")]
    Lifecycle {
        id: ContractId,
        #[source]
        source: LifecycleError,
    },

    #[error("Message contract {id} was modified concurrently: read revision {expected}, stored revision {actual}")]
    ConcurrentModification {
        id: ContractId,
        expected: u64,
        actual: u64,
    },

    #[error("Message contract not found: {0}")]
    NotFound(ContractId),

    #[error("Message contract \"{message_type}\" {version} already exists on topic {topic_id}")]
    DuplicateContractVersion {
        topic_id: KafkaTopicId,
        message_type: MessageType,
        version: ContractVersion,
    },

    #[error("Value \"{value}\" is not a valid {kind}")]
    InvalidValue { kind: &'static str, value: String },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ContractError {
    /// Machine-readable kind of this error
    pub fn code(&self) -> &'static str {
        match self {
            ContractError::SchemaParse(_) => "SchemaParseError",
            ContractError::MissingSchemaVersion => "MissingSchemaVersion",
            ContractError::InvalidSchemaVersion(_) => "InvalidSchemaVersion",
            ContractError::InvalidVersionSequence { .. }
            | ContractError::VersionSequenceExhausted { .. } => "InvalidVersionSequence",
            ContractError::PreviousContractNotProvisioned { .. } => "PreviousContractNotProvisioned",
            ContractError::Envelope(violation) => violation.code(),
            ContractError::Incompatible(reason) => reason.code(),
            ContractError::Lifecycle { source, .. } => source.code(),
            ContractError::ConcurrentModification { .. } => "ConcurrentModification",
            ContractError::NotFound(_) => "NotFound",
            ContractError::DuplicateContractVersion { .. } => "DuplicateContractVersion",
            ContractError::InvalidValue { .. } => "InvalidValue",
            ContractError::ChecksumMismatch { .. } => "ChecksumMismatch",
            ContractError::Storage(_) => "StorageError",
            ContractError::Io(_) => "IoError",
            ContractError::Json(_) => "JsonError",
        }
    }

    /// Whether this error reports a mutation of a provisioned contract
    pub fn is_frozen(&self) -> bool {
        matches!(
            self,
            ContractError::Lifecycle {
                source: LifecycleError::ContractFrozen { .. },
                ..
            }
        )
    }

    /// Structured rejection handed back to the caller at the request boundary
    pub fn rejection(&self) -> Rejection {
        let path = match self {
            ContractError::Incompatible(reason) => Some(reason.path().to_string()),
            ContractError::Envelope(violation) => Some(violation.field().to_string()),
            _ => None,
        };
        Rejection {
            code: self.code(),
            message: self.to_string(),
            path,
        }
    }
}

/// A request rejected by the validation pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    /// Error kind (e.g. "NewRequiredPropertyAdded")
    pub code: &'static str,
    /// Human-readable description
    pub message: String,
    /// Offending key path, when the failure points at one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}
