//! Message contract requests and lifecycle
//!
//! A request runs three checks before anything is written:
//!
//! 1. the declared `schemaVersion` must directly follow the latest stored,
//!    provisioned version of the message type;
//! 2. the message envelope, when the caller asks for it;
//! 3. backward compatibility with the previous provisioned schema, if any.
//!
//! Accepted requests are stored in `Requested`. Events raised by contracts
//! are moved into an outbox once the write succeeded.

use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info, info_span, warn};

use crate::compatibility::CompatibilityChecker;
use crate::contract::{ContractEvent, MessageContract, NewContract};
use crate::envelope::EnvelopeValidator;
use crate::error::{ContractError, Result};
use crate::lifecycle::{self, LifecycleEvent};
use crate::repository::ContractRepository;
use crate::schema::SchemaText;
use crate::types::{ContractExample, ContractId, KafkaTopicId, MessageType};
use crate::version::{ContractVersion, ContractVersionSequencer};

/// Writes attempted by one lifecycle call before a conflict is reported
const MAX_WRITE_ATTEMPTS: usize = 3;

/// A request for a new contract version
#[derive(Debug, Clone)]
pub struct NewContractRequest {
    pub kafka_topic_id: KafkaTopicId,
    pub message_type: MessageType,
    pub description: String,
    pub example: ContractExample,
    pub schema: SchemaText,
    pub requested_by: String,
    /// Require the message envelope fields
    pub enforce_envelope: bool,
}

/// Validates contract requests and drives contract lifecycles
pub struct ContractService<R> {
    repository: R,
    sequencer: ContractVersionSequencer,
    envelope: EnvelopeValidator,
    checker: CompatibilityChecker,
    outbox: Mutex<Vec<ContractEvent>>,
}

impl<R: ContractRepository> ContractService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository,
            sequencer: ContractVersionSequencer::new(),
            envelope: EnvelopeValidator::new(),
            checker: CompatibilityChecker::new(),
            outbox: Mutex::new(Vec::new()),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Run the request checks without storing anything.
    ///
    /// Returns the version the schema would be stored as.
    pub fn validate_request(
        &self,
        kafka_topic_id: KafkaTopicId,
        message_type: &MessageType,
        schema: &SchemaText,
        enforce_envelope: bool,
    ) -> Result<ContractVersion> {
        let latest = self.repository.latest(kafka_topic_id, message_type)?;
        self.validate_against(latest.as_ref(), schema, enforce_envelope)
    }

    /// Validate and store a new contract in `Requested`
    pub fn request_new(&self, request: NewContractRequest) -> Result<ContractId> {
        let span = info_span!(
            "request_new_message_contract",
            topic = %request.kafka_topic_id,
            message_type = %request.message_type,
            requested_by = %request.requested_by,
        );
        let _guard = span.enter();

        let version = self
            .validate_request(
                request.kafka_topic_id,
                &request.message_type,
                &request.schema,
                request.enforce_envelope,
            )
            .map_err(rejected)?;

        let mut contract = MessageContract::request_new(NewContract {
            kafka_topic_id: request.kafka_topic_id,
            message_type: request.message_type,
            description: request.description,
            example: request.example,
            schema: request.schema,
            schema_version: version,
            created_by: request.requested_by,
            created_at: Utc::now(),
        });
        let id = contract.id();
        let events = contract.take_events();

        // The repository enforces version uniqueness; losing a race ends here.
        self.repository.add(contract).map_err(rejected)?;
        self.publish(events)?;

        info!(contract_id = %id, version = %version, "New message contract has been requested");
        Ok(id)
    }

    /// Re-request a failed contract, optionally with a corrected schema.
    ///
    /// Validation runs again from scratch against the current predecessor.
    pub fn retry(
        &self,
        id: ContractId,
        schema: Option<SchemaText>,
        requested_by: &str,
        enforce_envelope: bool,
    ) -> Result<()> {
        let span = info_span!("retry_message_contract", contract_id = %id, requested_by);
        let _guard = span.enter();

        let mut contract = self.repository.get(id)?;
        lifecycle::transition(contract.status(), LifecycleEvent::Retry)
            .map_err(|source| ContractError::Lifecycle { id, source })
            .map_err(rejected)?;

        let predecessor = self
            .repository
            .history(contract.kafka_topic_id(), contract.message_type())?
            .into_iter()
            .filter(|c| c.schema_version() < contract.schema_version())
            .last();

        let schema = schema.unwrap_or_else(|| contract.schema().clone());
        let version = self
            .validate_against(predecessor.as_ref(), &schema, enforce_envelope)
            .map_err(rejected)?;
        if version != contract.schema_version() {
            return Err(rejected(ContractError::InvalidVersionSequence {
                expected: contract.schema_version(),
                proposed: version,
            }));
        }

        contract.retry(Some((schema, version)), Utc::now(), requested_by)?;
        self.save(contract)?;

        info!("Message contract has been re-requested");
        Ok(())
    }

    pub fn register_as_in_progress(&self, id: ContractId, changed_by: &str) -> Result<()> {
        if self
            .modify(id, |c| c.register_as_in_progress(Utc::now(), changed_by))?
            .is_some()
        {
            info!(contract_id = %id, "Message contract provisioning is in progress");
        }
        Ok(())
    }

    /// Mark a contract provisioned; repeated calls are no-ops
    pub fn register_as_provisioned(&self, id: ContractId, changed_by: &str) -> Result<()> {
        match self.modify(id, |c| c.register_as_provisioned(Utc::now(), changed_by))? {
            Some(contract) => info!(
                contract_id = %id,
                message_type = %contract.message_type(),
                version = %contract.schema_version(),
                "Message contract has been provisioned"
            ),
            None => debug!(contract_id = %id, "Message contract was already provisioned"),
        }
        Ok(())
    }

    pub fn register_as_failed(&self, id: ContractId, changed_by: &str) -> Result<()> {
        if self
            .modify(id, |c| c.register_as_failed(Utc::now(), changed_by))?
            .is_some()
        {
            warn!(contract_id = %id, "Message contract provisioning failed");
        }
        Ok(())
    }

    pub fn change_description(&self, id: ContractId, description: &str, changed_by: &str) -> Result<()> {
        self.modify(id, |c| {
            c.change_description(description, Utc::now(), changed_by);
            Ok(true)
        })?;
        debug!(contract_id = %id, "Message contract description changed");
        Ok(())
    }

    /// Take every event published since the last drain
    pub fn drain_outbox(&self) -> Result<Vec<ContractEvent>> {
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| ContractError::Storage("outbox lock poisoned".to_string()))?;
        Ok(std::mem::take(&mut *outbox))
    }

    fn validate_against(
        &self,
        predecessor: Option<&MessageContract>,
        schema: &SchemaText,
        enforce_envelope: bool,
    ) -> Result<ContractVersion> {
        let version = schema.contract_version()?;
        self.sequencer
            .check(predecessor.map(MessageContract::as_prior), version)?;

        let proposed = schema.document()?;
        if enforce_envelope {
            self.envelope.validate(&proposed)?;
        }

        // The sequencer only lets a provisioned predecessor through.
        if let Some(previous) = predecessor {
            let previous_document = previous.schema().document()?;
            self.checker.check(&previous_document, &proposed)?;
        }

        debug!(version = %version, "Message contract request is valid");
        Ok(version)
    }

    fn save(&self, mut contract: MessageContract) -> Result<()> {
        let events = contract.take_events();
        self.repository.update(contract)?;
        self.publish(events)
    }

    /// Apply `change` to the stored contract and write it back.
    ///
    /// On a revision conflict the contract is read again and `change`
    /// re-applied to the fresh copy. Returns the written contract, or `None`
    /// when `change` reported nothing to do.
    fn modify<F>(&self, id: ContractId, mut change: F) -> Result<Option<MessageContract>>
    where
        F: FnMut(&mut MessageContract) -> Result<bool>,
    {
        let mut attempt = 1;
        loop {
            let mut contract = self.repository.get(id)?;
            if !change(&mut contract)? {
                return Ok(None);
            }

            let events = contract.take_events();
            match self.repository.update(contract.clone()) {
                Ok(()) => {
                    self.publish(events)?;
                    return Ok(Some(contract));
                }
                Err(ContractError::ConcurrentModification { .. }) if attempt < MAX_WRITE_ATTEMPTS => {
                    debug!(contract_id = %id, attempt, "Message contract changed underneath, reading again");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn publish(&self, events: Vec<ContractEvent>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        let mut outbox = self
            .outbox
            .lock()
            .map_err(|_| ContractError::Storage("outbox lock poisoned".to_string()))?;
        outbox.extend(events);
        Ok(())
    }
}

fn rejected(error: ContractError) -> ContractError {
    warn!(code = error.code(), error = %error, "Message contract request rejected");
    error
}
