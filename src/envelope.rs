//! Message envelope validation
//!
//! Every published message carries a small envelope used for routing and
//! versioning: a constant integer `schemaVersion`, a string `type` and a
//! string `messageId`. All three must be required by the schema.

use thiserror::Error;

use crate::document::SchemaDocument;

/// Envelope fields, in the order they are checked
pub const ENVELOPE_FIELDS: [&str; 3] = ["schemaVersion", "type", "messageId"];

/// Envelope shape violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeViolation {
    #[error("required envelope field '{0}' is missing")]
    MissingEnvelopeField(String),

    #[error("envelope field '{0}' is not declared with the expected type")]
    InvalidEnvelopeField(String),
}

impl EnvelopeViolation {
    pub fn code(&self) -> &'static str {
        match self {
            EnvelopeViolation::MissingEnvelopeField(_) => "MissingEnvelopeField",
            EnvelopeViolation::InvalidEnvelopeField(_) => "InvalidEnvelopeField",
        }
    }

    /// The envelope field at fault
    pub fn field(&self) -> &str {
        match self {
            EnvelopeViolation::MissingEnvelopeField(field)
            | EnvelopeViolation::InvalidEnvelopeField(field) => field,
        }
    }
}

/// Checks a proposed schema for the mandatory envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopeValidator;

impl EnvelopeValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate the envelope, reporting the first violation found
    pub fn validate(&self, schema: &SchemaDocument) -> Result<(), EnvelopeViolation> {
        let required = schema.required();
        for field in ENVELOPE_FIELDS {
            if !required.contains(field) {
                return Err(EnvelopeViolation::MissingEnvelopeField(field.to_string()));
            }
        }

        let version = schema
            .property("schemaVersion")
            .filter(|p| p.declared_type() == Some("integer"))
            .and_then(|p| p.get("const"))
            .and_then(|c| c.as_i64());
        if version.is_none() {
            return Err(EnvelopeViolation::InvalidEnvelopeField(
                "schemaVersion".to_string(),
            ));
        }

        for field in ["type", "messageId"] {
            let is_string = schema
                .property(field)
                .is_some_and(|p| p.declared_type() == Some("string"));
            if !is_string {
                return Err(EnvelopeViolation::InvalidEnvelopeField(field.to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn envelope(required: &[&str]) -> Value {
        json!({
            "type": "object",
            "required": required,
            "properties": {
                "schemaVersion": { "type": "integer", "const": 1 },
                "type": { "type": "string" },
                "messageId": { "type": "string" },
                "data": { "type": "object" }
            }
        })
    }

    fn validate(value: Value) -> Result<(), EnvelopeViolation> {
        EnvelopeValidator::new().validate(&SchemaDocument::from(value))
    }

    #[test]
    fn test_valid_envelope() {
        assert_eq!(validate(envelope(&["schemaVersion", "type", "messageId", "data"])), Ok(()));
    }

    #[test]
    fn test_every_missing_required_combination_fails() {
        let combos: [&[&str]; 8] = [
            &["schemaVersion", "type"],
            &["schemaVersion", "messageId"],
            &["type", "messageId"],
            &["schemaVersion", "type", "data"],
            &["schemaVersion"],
            &["type"],
            &["messageId"],
            &[],
        ];
        for required in combos {
            let err = validate(envelope(required)).unwrap_err();
            assert!(
                matches!(err, EnvelopeViolation::MissingEnvelopeField(_)),
                "expected missing field for {:?}",
                required
            );
        }
    }

    #[test]
    fn test_first_missing_field_is_reported() {
        let err = validate(envelope(&["schemaVersion", "data"])).unwrap_err();
        assert_eq!(err, EnvelopeViolation::MissingEnvelopeField("type".to_string()));
    }

    #[test]
    fn test_missing_required_array() {
        let mut schema = envelope(&[]);
        schema.as_object_mut().unwrap().remove("required");
        let err = validate(schema).unwrap_err();
        assert_eq!(
            err,
            EnvelopeViolation::MissingEnvelopeField("schemaVersion".to_string())
        );
    }

    #[test]
    fn test_schema_version_needs_integer_const() {
        let mut schema = envelope(&["schemaVersion", "type", "messageId"]);
        schema["properties"]["schemaVersion"] = json!({ "type": "integer" });
        assert_eq!(
            validate(schema.clone()).unwrap_err(),
            EnvelopeViolation::InvalidEnvelopeField("schemaVersion".to_string())
        );

        schema["properties"]["schemaVersion"] = json!({ "type": "string", "const": 1 });
        assert_eq!(
            validate(schema).unwrap_err().field(),
            "schemaVersion"
        );
    }

    #[test]
    fn test_message_id_must_be_string() {
        let mut schema = envelope(&["schemaVersion", "type", "messageId"]);
        schema["properties"]["messageId"] = json!({ "type": "integer" });
        assert_eq!(
            validate(schema).unwrap_err(),
            EnvelopeViolation::InvalidEnvelopeField("messageId".to_string())
        );
    }

    #[test]
    fn test_type_property_must_exist() {
        let mut schema = envelope(&["schemaVersion", "type", "messageId"]);
        schema["properties"].as_object_mut().unwrap().remove("type");
        assert_eq!(
            validate(schema).unwrap_err(),
            EnvelopeViolation::InvalidEnvelopeField("type".to_string())
        );
    }
}
