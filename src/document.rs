//! Parsed JSON Schema documents
//!
//! A [`SchemaDocument`] is an immutable tree over a JSON value with the
//! handful of schema-aware accessors the envelope and compatibility checks
//! need. Objects keep their keys in document order.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

use crate::error::{ContractError, Result};

/// A parsed JSON Schema node
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaDocument {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<SchemaDocument>),
    /// Object members in document order
    Object(Vec<(String, SchemaDocument)>),
}

impl SchemaDocument {
    /// Parse a schema document from raw JSON text
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ContractError::SchemaParse(e.to_string()))?;
        Ok(Self::from(&value))
    }

    /// Look up a member of an object node
    pub fn get(&self, key: &str) -> Option<&SchemaDocument> {
        self.entries()
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    /// Members of an object node, empty for every other node
    pub fn entries(&self) -> &[(String, SchemaDocument)] {
        match self {
            SchemaDocument::Object(entries) => entries,
            _ => &[],
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SchemaDocument::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SchemaDocument::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[SchemaDocument]> {
        match self {
            SchemaDocument::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Declared `properties`, in document order
    pub fn properties(&self) -> &[(String, SchemaDocument)] {
        self.get("properties").map(|p| p.entries()).unwrap_or(&[])
    }

    /// A single declared property schema
    pub fn property(&self, name: &str) -> Option<&SchemaDocument> {
        self.get("properties")?.get(name)
    }

    /// Names listed in `required`
    pub fn required(&self) -> BTreeSet<&str> {
        self.get("required")
            .and_then(|r| r.as_array())
            .map(|items| items.iter().filter_map(|item| item.as_str()).collect())
            .unwrap_or_default()
    }

    /// `additionalProperties`, defaulting to true (open content model).
    ///
    /// Only an explicit `false` closes the model; a sub-schema still admits
    /// unlisted keys.
    pub fn additional_properties(&self) -> bool {
        !matches!(
            self.get("additionalProperties"),
            Some(SchemaDocument::Bool(false))
        )
    }

    /// The `type` keyword when it is a single type name
    pub fn declared_type(&self) -> Option<&str> {
        self.get("type").and_then(|t| t.as_str())
    }

    /// The `properties.schemaVersion.const` marker as an integer
    pub fn schema_version(&self) -> Option<i64> {
        self.property("schemaVersion")?.get("const")?.as_i64()
    }

    /// Item schemas of an array schema, as positional slots.
    ///
    /// `prefixItems` and tuple-form `items` yield one slot per entry; a single
    /// `items` schema is one slot.
    pub fn items(&self) -> Vec<&SchemaDocument> {
        if let Some(prefix) = self.get("prefixItems").and_then(|p| p.as_array()) {
            return prefix.iter().collect();
        }
        match self.get("items") {
            Some(SchemaDocument::Array(tuple)) => tuple.iter().collect(),
            Some(single) => vec![single],
            None => Vec::new(),
        }
    }

    /// The kind of value this schema node describes
    pub fn kind(&self) -> SchemaKind {
        match self {
            SchemaDocument::Bool(true) => SchemaKind::Any,
            SchemaDocument::Bool(false) => SchemaKind::Never,
            SchemaDocument::Object(_) => match self.get("type") {
                Some(SchemaDocument::String(name)) => SchemaKind::from_type_name(name),
                Some(SchemaDocument::Array(names)) => SchemaKind::union(
                    names
                        .iter()
                        .filter_map(|n| n.as_str())
                        .map(SchemaKind::from_type_name),
                ),
                _ if self.get("properties").is_some()
                    || self.get("additionalProperties").is_some() =>
                {
                    SchemaKind::Object
                }
                _ if self.get("items").is_some() || self.get("prefixItems").is_some() => {
                    SchemaKind::Array
                }
                _ => SchemaKind::Any,
            },
            _ => SchemaKind::Any,
        }
    }
}

impl From<&Value> for SchemaDocument {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SchemaDocument::Null,
            Value::Bool(b) => SchemaDocument::Bool(*b),
            Value::Number(n) => SchemaDocument::Number(n.clone()),
            Value::String(s) => SchemaDocument::String(s.clone()),
            Value::Array(items) => SchemaDocument::Array(items.iter().map(Self::from).collect()),
            Value::Object(map) => SchemaDocument::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for SchemaDocument {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

/// Kind of value a schema node admits
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaKind {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
    /// `"type": [...]` with more than one distinct entry, sorted
    Union(Vec<SchemaKind>),
    /// No type constraint (`true`, `{}`)
    Any,
    /// The `false` schema
    Never,
}

impl SchemaKind {
    /// Map a JSON Schema `type` name to a kind
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "null" => SchemaKind::Null,
            "boolean" => SchemaKind::Boolean,
            "integer" => SchemaKind::Integer,
            "number" => SchemaKind::Number,
            "string" => SchemaKind::String,
            "array" => SchemaKind::Array,
            "object" => SchemaKind::Object,
            _ => SchemaKind::Any,
        }
    }

    fn union(kinds: impl Iterator<Item = SchemaKind>) -> Self {
        let mut kinds: Vec<_> = kinds.collect();
        kinds.sort();
        kinds.dedup();
        match kinds.len() {
            0 => SchemaKind::Any,
            1 => kinds.remove(0),
            _ => SchemaKind::Union(kinds),
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaKind::Null => f.write_str("null"),
            SchemaKind::Boolean => f.write_str("boolean"),
            SchemaKind::Integer => f.write_str("integer"),
            SchemaKind::Number => f.write_str("number"),
            SchemaKind::String => f.write_str("string"),
            SchemaKind::Array => f.write_str("array"),
            SchemaKind::Object => f.write_str("object"),
            SchemaKind::Union(kinds) => {
                let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
                f.write_str(&names.join("|"))
            }
            SchemaKind::Any => f.write_str("any"),
            SchemaKind::Never => f.write_str("never"),
        }
    }
}

impl Serialize for SchemaKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> SchemaDocument {
        SchemaDocument::from(value)
    }

    #[test]
    fn test_open_content_model_by_default() {
        let schema = doc(json!({ "type": "object" }));
        assert!(schema.additional_properties());
        assert!(schema.properties().is_empty());
        assert!(schema.required().is_empty());
    }

    #[test]
    fn test_only_false_closes_the_model() {
        assert!(!doc(json!({ "additionalProperties": false })).additional_properties());
        assert!(doc(json!({ "additionalProperties": true })).additional_properties());
        assert!(doc(json!({ "additionalProperties": { "type": "string" } })).additional_properties());
    }

    #[test]
    fn test_properties_keep_document_order() {
        let schema = SchemaDocument::parse(
            r#"{"properties": {"zeta": {}, "alpha": {}, "mid": {}}}"#,
        )
        .unwrap();
        let names: Vec<&str> = schema.properties().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_schema_version_marker() {
        let schema = doc(json!({
            "properties": { "schemaVersion": { "type": "integer", "const": 3 } }
        }));
        assert_eq!(schema.schema_version(), Some(3));

        let no_const = doc(json!({
            "properties": { "schemaVersion": { "type": "integer" } }
        }));
        assert_eq!(no_const.schema_version(), None);

        let string_const = doc(json!({
            "properties": { "schemaVersion": { "const": "3" } }
        }));
        assert_eq!(string_const.schema_version(), None);
    }

    #[test]
    fn test_kind_inference() {
        assert_eq!(doc(json!({ "type": "string" })).kind(), SchemaKind::String);
        assert_eq!(doc(json!({ "properties": {} })).kind(), SchemaKind::Object);
        assert_eq!(doc(json!({ "items": {} })).kind(), SchemaKind::Array);
        assert_eq!(doc(json!({})).kind(), SchemaKind::Any);
        assert_eq!(doc(json!(false)).kind(), SchemaKind::Never);
        assert_eq!(
            doc(json!({ "type": ["null", "string", "null"] })).kind(),
            SchemaKind::Union(vec![SchemaKind::Null, SchemaKind::String])
        );
        assert_eq!(doc(json!({ "type": ["string"] })).kind(), SchemaKind::String);
        assert_eq!(
            SchemaKind::Union(vec![SchemaKind::Null, SchemaKind::String]).to_string(),
            "null|string"
        );
    }

    #[test]
    fn test_items_as_positional_slots() {
        let single = doc(json!({ "type": "array", "items": { "type": "string" } }));
        assert_eq!(single.items().len(), 1);

        let tuple = doc(json!({
            "type": "array",
            "items": [{ "type": "string" }, { "type": "integer" }]
        }));
        assert_eq!(tuple.items().len(), 2);

        let prefixed = doc(json!({
            "type": "array",
            "prefixItems": [{ "type": "string" }],
            "items": false
        }));
        assert_eq!(prefixed.items().len(), 1);
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let err = SchemaDocument::parse("{ not json").unwrap_err();
        assert!(matches!(err, ContractError::SchemaParse(_)));
    }
}
