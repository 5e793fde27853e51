//! Message Contracts
//!
//! Lifecycle and schema compatibility rules for message contracts: versioned
//! JSON Schemas describing one message type published on one Kafka topic.
//!
//! ## Features
//!
//! - **Strict Versioning**: Versions start at 1 and grow by exactly one, and
//!   only once the previous version has been provisioned
//! - **Envelope Validation**: `schemaVersion`, `type` and `messageId` are
//!   required on every message
//! - **Compatibility Checking**: Open and closed content models are compared
//!   recursively so existing consumers keep working
//! - **Lifecycle**: `Requested → In Progress → Provisioned`, with `Failed`
//!   and retry; provisioned contracts are frozen
//! - **Checksum Validation**: SHA256 checksums of the stored schema text
//!
//! ## Request pipeline
//!
//! ```text
//! schema text ──▶ SchemaText::parse ──▶ ContractVersionSequencer
//!                                             │
//!                 CompatibilityChecker ◀── EnvelopeValidator
//!                        │
//!                        ▼
//!             ContractRepository::add ──▶ outbox (ContractEvent)
//! ```

pub mod checksum;
pub mod compatibility;
pub mod config;
pub mod contract;
pub mod document;
pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod repository;
pub mod schema;
pub mod service;
pub mod types;
pub mod version;

pub use checksum::Checksum;
pub use compatibility::{CompatibilityChecker, CompatibilityReport, IncompatibilityReason};
pub use config::ContractConfig;
pub use contract::{ContractEvent, MessageContract};
pub use document::{SchemaDocument, SchemaKind};
pub use envelope::{EnvelopeValidator, EnvelopeViolation};
pub use error::{ContractError, Rejection, Result};
pub use lifecycle::{ContractStatus, LifecycleError, LifecycleEvent};
pub use repository::{ContractRepository, InMemoryContractRepository};
pub use schema::SchemaText;
pub use service::{ContractService, NewContractRequest};
pub use types::{ContractExample, ContractId, KafkaTopicId, MessageType};
pub use version::{ContractVersion, ContractVersionSequencer, PriorContract};
