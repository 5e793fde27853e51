//! Contract storage
//!
//! [`ContractRepository`] is the seam to whatever persists contracts.
//! Implementations must make `add` atomic with respect to the
//! (topic, message type, version) key: of two concurrent inserts of the same
//! version exactly one succeeds, the other gets
//! [`ContractError::DuplicateContractVersion`]. `update` is a compare-and-swap
//! on [`MessageContract::revision`]: a copy read before another write landed
//! is refused with [`ContractError::ConcurrentModification`], and the stored
//! copy moves to the next revision.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::contract::MessageContract;
use crate::error::{ContractError, Result};
use crate::lifecycle::{self, LifecycleEvent};
use crate::types::{ContractId, KafkaTopicId, MessageType};

/// Storage for message contracts
pub trait ContractRepository: Send + Sync {
    /// Look up a contract by id
    fn find(&self, id: ContractId) -> Result<Option<MessageContract>>;

    /// All versions of one message type on a topic, oldest first
    fn history(&self, topic: KafkaTopicId, message_type: &MessageType) -> Result<Vec<MessageContract>>;

    /// All contracts on a topic
    fn find_by_topic(&self, topic: KafkaTopicId) -> Result<Vec<MessageContract>>;

    /// Insert a new contract, rejecting a duplicate (topic, message type, version)
    fn add(&self, contract: MessageContract) -> Result<()>;

    /// Replace a stored contract read at its current revision
    fn update(&self, contract: MessageContract) -> Result<()>;

    /// Look up a contract that must exist
    fn get(&self, id: ContractId) -> Result<MessageContract> {
        self.find(id)?.ok_or(ContractError::NotFound(id))
    }

    /// The highest version stored for a message type, whatever its status
    fn latest(&self, topic: KafkaTopicId, message_type: &MessageType) -> Result<Option<MessageContract>> {
        Ok(self.history(topic, message_type)?.pop())
    }
}

/// In-process repository guarded by a single lock
#[derive(Debug, Default)]
pub struct InMemoryContractRepository {
    contracts: RwLock<HashMap<ContractId, MessageContract>>,
}

impl InMemoryContractRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored contracts
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ContractId, MessageContract>>> {
        self.contracts
            .read()
            .map_err(|_| ContractError::Storage("contract store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<ContractId, MessageContract>>> {
        self.contracts
            .write()
            .map_err(|_| ContractError::Storage("contract store lock poisoned".to_string()))
    }
}

impl ContractRepository for InMemoryContractRepository {
    fn find(&self, id: ContractId) -> Result<Option<MessageContract>> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn history(&self, topic: KafkaTopicId, message_type: &MessageType) -> Result<Vec<MessageContract>> {
        let mut versions: Vec<MessageContract> = self
            .read()?
            .values()
            .filter(|c| c.kafka_topic_id() == topic && c.message_type() == message_type)
            .cloned()
            .collect();
        versions.sort_by_key(|c| c.schema_version());
        Ok(versions)
    }

    fn find_by_topic(&self, topic: KafkaTopicId) -> Result<Vec<MessageContract>> {
        let mut contracts: Vec<MessageContract> = self
            .read()?
            .values()
            .filter(|c| c.kafka_topic_id() == topic)
            .cloned()
            .collect();
        contracts.sort_by(|a, b| {
            (a.message_type(), a.schema_version()).cmp(&(b.message_type(), b.schema_version()))
        });
        Ok(contracts)
    }

    fn add(&self, mut contract: MessageContract) -> Result<()> {
        let mut contracts = self.write()?;

        let duplicate = contracts.values().any(|c| {
            c.kafka_topic_id() == contract.kafka_topic_id()
                && c.message_type() == contract.message_type()
                && c.schema_version() == contract.schema_version()
        });
        if duplicate || contracts.contains_key(&contract.id()) {
            return Err(ContractError::DuplicateContractVersion {
                topic_id: contract.kafka_topic_id(),
                message_type: contract.message_type().clone(),
                version: contract.schema_version(),
            });
        }

        contract.take_events();
        contracts.insert(contract.id(), contract);
        Ok(())
    }

    fn update(&self, mut contract: MessageContract) -> Result<()> {
        let mut contracts = self.write()?;
        let stored = contracts
            .get(&contract.id())
            .ok_or(ContractError::NotFound(contract.id()))?;

        // A provisioned schema is frozen, whatever the caller did to its copy.
        let replaces_content = stored.schema_checksum() != contract.schema_checksum()
            || (stored.status().is_frozen() && contract.status() != stored.status());
        if replaces_content {
            lifecycle::transition(stored.status(), LifecycleEvent::Overwrite).map_err(|source| {
                ContractError::Lifecycle {
                    id: contract.id(),
                    source,
                }
            })?;
        }

        if stored.revision() != contract.revision() {
            return Err(ContractError::ConcurrentModification {
                id: contract.id(),
                expected: contract.revision(),
                actual: stored.revision(),
            });
        }

        contract.take_events();
        contract.advance_revision();
        contracts.insert(contract.id(), contract);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::tests::contract;
    use crate::lifecycle::ContractStatus;
    use crate::schema::SchemaText;
    use chrono::Utc;

    #[test]
    fn test_create_repository() {
        let repo = InMemoryContractRepository::new();
        assert!(repo.is_empty().unwrap());
    }

    #[test]
    fn test_history_is_ordered_by_version() {
        let repo = InMemoryContractRepository::new();
        let topic = KafkaTopicId::new();
        for version in [2, 1, 3] {
            repo.add(contract(topic, "order-created", version)).unwrap();
        }
        repo.add(contract(topic, "order-cancelled", 1)).unwrap();
        repo.add(contract(KafkaTopicId::new(), "order-created", 4)).unwrap();

        let message_type = MessageType::parse("order-created").unwrap();
        let versions: Vec<u32> = repo
            .history(topic, &message_type)
            .unwrap()
            .iter()
            .map(|c| c.schema_version().get())
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(
            repo.latest(topic, &message_type).unwrap().unwrap().schema_version().get(),
            3
        );
        assert_eq!(repo.find_by_topic(topic).unwrap().len(), 4);
    }

    #[test]
    fn test_duplicate_version_is_rejected() {
        let repo = InMemoryContractRepository::new();
        let topic = KafkaTopicId::new();
        repo.add(contract(topic, "order-created", 1)).unwrap();

        let result = repo.add(contract(topic, "order-created", 1));
        assert!(matches!(
            result,
            Err(ContractError::DuplicateContractVersion { .. })
        ));
        assert_eq!(repo.len().unwrap(), 1);
    }

    #[test]
    fn test_get_missing_contract() {
        let repo = InMemoryContractRepository::new();
        assert!(matches!(
            repo.get(ContractId::new()),
            Err(ContractError::NotFound(_))
        ));
    }

    #[test]
    fn test_stored_provisioned_contract_cannot_be_reverted() {
        let repo = InMemoryContractRepository::new();
        let mut c = contract(KafkaTopicId::new(), "order-created", 1);
        let id = c.id();
        let stale = c.clone();
        c.register_as_provisioned(Utc::now(), "broker").unwrap();
        repo.add(c).unwrap();

        let err = repo.update(stale).unwrap_err();
        assert!(err.is_frozen());
        assert_eq!(repo.get(id).unwrap().status(), ContractStatus::Provisioned);
    }

    #[test]
    fn test_update_advances_revision() {
        let repo = InMemoryContractRepository::new();
        let c = contract(KafkaTopicId::new(), "order-created", 1);
        let id = c.id();
        repo.add(c).unwrap();

        let mut copy = repo.get(id).unwrap();
        assert_eq!(copy.revision(), 0);
        copy.register_as_in_progress(Utc::now(), "broker").unwrap();
        repo.update(copy).unwrap();
        assert_eq!(repo.get(id).unwrap().revision(), 1);
    }

    #[test]
    fn test_stale_copy_is_refused() {
        let repo = InMemoryContractRepository::new();
        let c = contract(KafkaTopicId::new(), "order-created", 1);
        let id = c.id();
        repo.add(c).unwrap();

        let mut failing = repo.get(id).unwrap();
        let mut progressing = repo.get(id).unwrap();
        failing.register_as_failed(Utc::now(), "broker").unwrap();
        repo.update(failing).unwrap();

        progressing.register_as_in_progress(Utc::now(), "broker").unwrap();
        let err = repo.update(progressing).unwrap_err();
        assert!(matches!(
            err,
            ContractError::ConcurrentModification { expected: 0, actual: 1, .. }
        ));
        assert_eq!(repo.get(id).unwrap().status(), ContractStatus::Failed);
    }

    #[test]
    fn test_failed_contract_schema_can_be_replaced() {
        let repo = InMemoryContractRepository::new();
        let c = contract(KafkaTopicId::new(), "order-created", 1);
        let id = c.id();
        repo.add(c).unwrap();

        let mut copy = repo.get(id).unwrap();
        copy.register_as_failed(Utc::now(), "broker").unwrap();
        repo.update(copy).unwrap();

        let mut copy = repo.get(id).unwrap();
        let replacement = SchemaText::parse(
            r#"{"properties": {"schemaVersion": {"type": "integer", "const": 1}, "id": {"type": "string"}}}"#,
        )
        .unwrap();
        let version = replacement.contract_version().unwrap();
        copy.retry(Some((replacement.clone(), version)), Utc::now(), "user").unwrap();
        repo.update(copy).unwrap();

        let stored = repo.get(id).unwrap();
        assert_eq!(stored.schema(), &replacement);
        assert_eq!(stored.status(), ContractStatus::Requested);
    }
}
