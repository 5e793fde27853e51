//! Identifiers and names used by message contracts

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ContractError, Result};

/// Identity of a message contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(Uuid);

impl ContractId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContractId {
    fn default() -> Self {
        Self::new()
    }
}

/// Rendered as 32 lowercase hex digits without hyphens
impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for ContractId {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ContractError::InvalidValue {
                kind: "message contract id",
                value: s.to_string(),
            })
    }
}

/// Identity of the Kafka topic a contract belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KafkaTopicId(Uuid);

impl KafkaTopicId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KafkaTopicId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for KafkaTopicId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for KafkaTopicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for KafkaTopicId {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| ContractError::InvalidValue {
                kind: "kafka topic id",
                value: s.to_string(),
            })
    }
}

fn message_type_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9_-]*[a-zA-Z0-9])?$").expect("message type pattern")
    })
}

/// Name of a message type, unique per topic (e.g. "order-created").
///
/// Letters, digits, `_` and `-` only, not starting or ending with a
/// separator. Stored lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageType(String);

impl MessageType {
    pub fn parse(text: &str) -> Result<Self> {
        if !message_type_pattern().is_match(text) {
            return Err(ContractError::InvalidValue {
                kind: "message type",
                value: text.to_string(),
            });
        }
        Ok(Self(text.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for MessageType {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MessageType {
    type Error = ContractError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        value.0
    }
}

/// Example message attached to a contract, kept as opaque text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContractExample(String);

impl ContractExample {
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(ContractError::InvalidValue {
                kind: "message contract example",
                value: text.to_string(),
            });
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ContractExample {
    type Error = ContractError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ContractExample> for String {
    fn from(value: ContractExample) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_type_rules() {
        assert_eq!(MessageType::parse("Order-Created").unwrap().as_str(), "order-created");
        assert!(MessageType::parse("order_created_v2").is_ok());
        assert!(MessageType::parse("a").is_ok());

        for invalid in ["", "   ", " order", "order ", "-order", "order_", "order created", "ordér"] {
            assert!(MessageType::parse(invalid).is_err(), "{:?} should be rejected", invalid);
        }
    }

    #[test]
    fn test_message_type_serde_validates() {
        let parsed: MessageType = serde_json::from_str("\"Invoice\"").unwrap();
        assert_eq!(parsed.as_str(), "invoice");
        assert!(serde_json::from_str::<MessageType>("\"_bad\"").is_err());
    }

    #[test]
    fn test_contract_id_text() {
        let id = ContractId::new();
        let text = id.to_string();
        assert_eq!(text.len(), 32);
        assert!(!text.contains('-'));
        assert_eq!(text.parse::<ContractId>().unwrap(), id);
        assert!("not-an-id".parse::<ContractId>().is_err());
    }

    #[test]
    fn test_topic_id_round_trips_through_text() {
        let id = KafkaTopicId::new();
        assert_eq!(id.to_string().parse::<KafkaTopicId>().unwrap(), id);
    }

    #[test]
    fn test_blank_example_rejected() {
        assert!(ContractExample::parse("  \n").is_err());
        assert_eq!(ContractExample::parse("{}").unwrap().as_str(), "{}");
    }
}
