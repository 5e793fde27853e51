//! Raw message schema text

use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checksum::Checksum;
use crate::document::SchemaDocument;
use crate::error::{ContractError, Result};
use crate::version::ContractVersion;

/// The JSON Schema text of a message contract, as submitted.
///
/// Parsing guarantees the text is valid JSON and a valid JSON Schema; the
/// `schemaVersion` marker is extracted once and kept alongside the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchemaText {
    raw: String,
    schema_version: Option<i64>,
}

impl SchemaText {
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(ContractError::SchemaParse("schema text is empty".to_string()));
        }

        let value: Value = serde_json::from_str(text)
            .map_err(|e| ContractError::SchemaParse(format!("not valid JSON: {}", e)))?;
        validate_meta_schema(&value)?;

        let schema_version = SchemaDocument::from(&value).schema_version();
        Ok(Self {
            raw: text.to_string(),
            schema_version,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The raw `properties.schemaVersion.const` value, if declared
    pub fn schema_version(&self) -> Option<i64> {
        self.schema_version
    }

    /// The declared version as a contract version
    pub fn contract_version(&self) -> Result<ContractVersion> {
        let version = self
            .schema_version
            .ok_or(ContractError::MissingSchemaVersion)?;
        ContractVersion::new(version)
    }

    /// A fresh parsed tree over this text
    pub fn document(&self) -> Result<SchemaDocument> {
        SchemaDocument::parse(&self.raw)
    }

    pub fn checksum(&self) -> Checksum {
        Checksum::of_text(&self.raw)
    }
}

impl TryFrom<String> for SchemaText {
    type Error = ContractError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<SchemaText> for String {
    fn from(value: SchemaText) -> Self {
        value.raw
    }
}

/// Compiling the schema validates it against its draft's meta-schema
fn validate_meta_schema(value: &Value) -> Result<()> {
    JSONSchema::compile(value)
        .map(|_| ())
        .map_err(|e| ContractError::SchemaParse(format!("not a valid JSON schema: {}", e)))
}
