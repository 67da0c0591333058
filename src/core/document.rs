//! Structured document records.
//!
//! Incoming JSON objects are flattened into dotted field names and typed
//! values before they reach the WAL, so every write can be checked
//! against the index mappings.

use crate::core::error::{QuarryError, Result};
use crate::core::types::{FieldType, Mappings, TIME_FIELD_NAME};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A typed field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<FieldValue>),
}

impl FieldValue {
    fn from_json(field: &str, value: Value) -> Result<Option<Self>> {
        let converted = match value {
            Value::Null => None,
            Value::Bool(b) => Some(FieldValue::Bool(b)),
            Value::Number(n) => {
                let f = n.as_f64().ok_or_else(|| QuarryError::InvalidDocumentField {
                    field: field.to_string(),
                    message: format!("number {n} is out of range"),
                })?;
                Some(FieldValue::Number(f))
            }
            Value::String(s) => Some(FieldValue::String(s)),
            Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_object() {
                        return Err(QuarryError::InvalidDocumentField {
                            field: field.to_string(),
                            message: "arrays of objects are not supported".to_string(),
                        });
                    }
                    if let Some(v) = FieldValue::from_json(field, item)? {
                        values.push(v);
                    }
                }
                Some(FieldValue::Array(values))
            }
            Value::Object(_) => {
                return Err(QuarryError::InvalidDocumentField {
                    field: field.to_string(),
                    message: "nested object was not flattened".to_string(),
                })
            }
        };
        Ok(converted)
    }

    /// Type this value would get if its field were unmapped
    fn infer_type(&self) -> Option<FieldType> {
        match self {
            FieldValue::Bool(_) => Some(FieldType::Bool),
            FieldValue::Number(_) => Some(FieldType::Numeric),
            FieldValue::String(s) if DateTime::parse_from_rfc3339(s).is_ok() => {
                Some(FieldType::Date)
            }
            FieldValue::String(_) => Some(FieldType::Text),
            FieldValue::Array(items) => items.first().and_then(FieldValue::infer_type),
        }
    }

    fn check(&self, field: &str, expected: FieldType) -> Result<()> {
        let ok = match (self, expected) {
            (FieldValue::Array(items), _) => {
                for item in items {
                    item.check(field, expected)?;
                }
                true
            }
            (FieldValue::String(_), FieldType::Text | FieldType::Keyword) => true,
            (FieldValue::Number(_), FieldType::Numeric) => true,
            (FieldValue::Bool(_), FieldType::Bool) => true,
            // dates are RFC 3339 strings or unix milliseconds
            (FieldValue::String(s), FieldType::Date) => DateTime::parse_from_rfc3339(s).is_ok(),
            (FieldValue::Number(_), FieldType::Date) => true,
            _ => false,
        };

        if ok {
            Ok(())
        } else {
            Err(QuarryError::InvalidDocumentField {
                field: field.to_string(),
                message: format!("value {} does not match mapped type {expected}", self.describe()),
            })
        }
    }

    fn describe(&self) -> String {
        match self {
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::String(s) => format!("{s:?}"),
            FieldValue::Array(items) => format!("array of {}", items.len()),
        }
    }
}

/// A document as a flat map of dotted field names to typed values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a JSON value, which must be an object
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(QuarryError::InvalidDocument(format!(
                "document must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Build a document from a JSON object, flattening nested objects
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        let mut doc = Self::new();
        flatten_into(&mut doc.fields, "", map)?;
        Ok(doc)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Stamp the reserved time field with `now` when the caller left it out
    pub fn ensure_timestamp(&mut self, now: DateTime<Utc>) {
        self.fields
            .entry(TIME_FIELD_NAME.to_string())
            .or_insert_with(|| FieldValue::String(now.to_rfc3339()));
    }

    /// Check mapped fields and infer types for unmapped ones
    ///
    /// Returns the `(field, type)` pairs that should be added to the
    /// mappings. Fields holding only empty arrays are left unmapped.
    pub fn validate(&self, mappings: &Mappings) -> Result<Vec<(String, FieldType)>> {
        let mut inferred = Vec::new();
        for (field, value) in &self.fields {
            match mappings.get_property(field) {
                Some(prop) => value.check(field, prop.field_type)?,
                None => {
                    if let Some(t) = value.infer_type() {
                        value.check(field, t)?;
                        inferred.push((field.clone(), t));
                    }
                }
            }
        }
        Ok(inferred)
    }

    /// Serialized size in bytes, the unit shard sizes are measured in
    pub fn encoded_len(&self) -> Result<u64> {
        Ok(serde_json::to_vec(self)?.len() as u64)
    }

    /// Render as a flat JSON object
    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

fn flatten_into(
    out: &mut BTreeMap<String, FieldValue>,
    prefix: &str,
    map: Map<String, Value>,
) -> Result<()> {
    for (key, value) in map {
        if key.is_empty() {
            return Err(QuarryError::InvalidDocument(
                "field names cannot be empty".to_string(),
            ));
        }
        let field = if prefix.is_empty() {
            key
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(out, &field, nested)?,
            other => {
                if let Some(v) = FieldValue::from_json(&field, other)? {
                    if out.contains_key(&field) {
                        return Err(QuarryError::InvalidDocumentField {
                            field,
                            message: "field is given both as a dotted name and as a nested object"
                                .to_string(),
                        });
                    }
                    out.insert(field, v);
                }
            }
        }
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
