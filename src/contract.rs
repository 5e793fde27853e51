//! The message contract aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::error::{ContractError, Result};
use crate::lifecycle::{self, ContractStatus, LifecycleEvent, Transition};
use crate::schema::SchemaText;
use crate::types::{ContractExample, ContractId, KafkaTopicId, MessageType};
use crate::version::{ContractVersion, PriorContract};

/// Domain events raised by a contract, published through the outbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ContractEvent {
    /// A contract was requested or retried and needs provisioning
    Requested {
        contract_id: ContractId,
        kafka_topic_id: KafkaTopicId,
        message_type: MessageType,
        schema: String,
        schema_version: ContractVersion,
        description: String,
    },
    /// A contract reached the provisioned state
    Provisioned {
        contract_id: ContractId,
        kafka_topic_id: KafkaTopicId,
        message_type: MessageType,
    },
}

/// Fields of a contract that passed request validation
#[derive(Debug, Clone)]
pub struct NewContract {
    pub kafka_topic_id: KafkaTopicId,
    pub message_type: MessageType,
    pub description: String,
    pub example: ContractExample,
    pub schema: SchemaText,
    pub schema_version: ContractVersion,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// A versioned schema bound to one message type on one topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageContract {
    id: ContractId,
    kafka_topic_id: KafkaTopicId,
    message_type: MessageType,
    description: String,
    example: ContractExample,
    schema: SchemaText,
    schema_version: ContractVersion,
    schema_checksum: Checksum,
    status: ContractStatus,
    created_at: DateTime<Utc>,
    created_by: String,
    modified_at: Option<DateTime<Utc>>,
    modified_by: Option<String>,
    /// Number of accepted writes since the contract was stored
    #[serde(default)]
    revision: u64,
    #[serde(skip)]
    events: Vec<ContractEvent>,
}

impl MessageContract {
    /// Create a contract in `Requested`, raising [`ContractEvent::Requested`].
    ///
    /// Only the request pipeline calls this, after sequencing, envelope and
    /// compatibility checks have passed.
    pub(crate) fn request_new(new: NewContract) -> Self {
        let schema_checksum = new.schema.checksum();
        let mut contract = Self {
            id: ContractId::new(),
            kafka_topic_id: new.kafka_topic_id,
            message_type: new.message_type,
            description: new.description,
            example: new.example,
            schema: new.schema,
            schema_version: new.schema_version,
            schema_checksum,
            status: ContractStatus::Requested,
            created_at: new.created_at,
            created_by: new.created_by.clone(),
            modified_at: Some(new.created_at),
            modified_by: Some(new.created_by),
            revision: 0,
            events: Vec::new(),
        };
        contract.raise_requested();
        contract
    }

    pub fn id(&self) -> ContractId {
        self.id
    }

    pub fn kafka_topic_id(&self) -> KafkaTopicId {
        self.kafka_topic_id
    }

    pub fn message_type(&self) -> &MessageType {
        &self.message_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn example(&self) -> &ContractExample {
        &self.example
    }

    pub fn schema(&self) -> &SchemaText {
        &self.schema
    }

    pub fn schema_version(&self) -> ContractVersion {
        self.schema_version
    }

    pub fn schema_checksum(&self) -> &Checksum {
        &self.schema_checksum
    }

    pub fn status(&self) -> ContractStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        self.modified_at
    }

    pub fn modified_by(&self) -> Option<&str> {
        self.modified_by.as_deref()
    }

    /// Revision this copy was read at
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Move to the next revision. Repositories call this when they accept a write.
    pub fn advance_revision(&mut self) {
        self.revision += 1;
    }

    /// Version and status, as seen by the sequencer
    pub fn as_prior(&self) -> PriorContract {
        PriorContract {
            version: self.schema_version,
            status: self.status,
        }
    }

    pub fn register_as_in_progress(&mut self, at: DateTime<Utc>, by: &str) -> Result<bool> {
        self.apply(LifecycleEvent::MarkInProgress, at, by)
    }

    /// Mark provisioned. Repeating this on a provisioned contract is a no-op.
    pub fn register_as_provisioned(&mut self, at: DateTime<Utc>, by: &str) -> Result<bool> {
        let changed = self.apply(LifecycleEvent::MarkProvisioned, at, by)?;
        if changed {
            self.events.push(ContractEvent::Provisioned {
                contract_id: self.id,
                kafka_topic_id: self.kafka_topic_id,
                message_type: self.message_type.clone(),
            });
        }
        Ok(changed)
    }

    pub fn register_as_failed(&mut self, at: DateTime<Utc>, by: &str) -> Result<bool> {
        self.apply(LifecycleEvent::MarkFailed, at, by)
    }

    /// Put a failed contract back into `Requested`, optionally with a corrected schema.
    ///
    /// The caller is responsible for re-validating `schema` first.
    pub(crate) fn retry(
        &mut self,
        schema: Option<(SchemaText, ContractVersion)>,
        at: DateTime<Utc>,
        by: &str,
    ) -> Result<()> {
        self.apply(LifecycleEvent::Retry, at, by)?;
        if let Some((schema, version)) = schema {
            self.schema_checksum = schema.checksum();
            self.schema = schema;
            self.schema_version = version;
        }
        self.raise_requested();
        Ok(())
    }

    /// Descriptions are documentation and may change in any state
    pub fn change_description(&mut self, description: impl Into<String>, at: DateTime<Utc>, by: &str) {
        self.description = description.into();
        self.touch(at, by);
    }

    /// Check the schema text still matches the checksum recorded for it
    pub fn verify_schema_integrity(&self) -> Result<()> {
        self.schema_checksum.verify(self.schema.as_str())
    }

    /// Drain events raised since the last call
    pub fn take_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }

    /// Apply a lifecycle event, returning whether the status changed
    fn apply(&mut self, event: LifecycleEvent, at: DateTime<Utc>, by: &str) -> Result<bool> {
        let outcome = lifecycle::transition(self.status, event).map_err(|source| {
            ContractError::Lifecycle {
                id: self.id,
                source,
            }
        })?;

        match outcome {
            Transition::Changed(status) => {
                self.status = status;
                self.touch(at, by);
                Ok(true)
            }
            Transition::Unchanged => Ok(false),
        }
    }

    fn touch(&mut self, at: DateTime<Utc>, by: &str) {
        self.modified_at = Some(at);
        self.modified_by = Some(by.to_string());
    }

    fn raise_requested(&mut self) {
        self.events.push(ContractEvent::Requested {
            contract_id: self.id,
            kafka_topic_id: self.kafka_topic_id,
            message_type: self.message_type.clone(),
            schema: self.schema.as_str().to_string(),
            schema_version: self.schema_version,
            description: self.description.clone(),
        });
    }
}
