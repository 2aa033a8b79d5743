//! Record model and payload decoding
//!
//! A blob payload is either one JSON object or a JSON array of objects.
//! Decoding normalizes both shapes into a sequence of [`Record`]s, each of
//! which must carry a non-empty string `id` field.

use docsink_common::{DocsinkError, Result};
use serde_json::Value;

/// One unit of work: a JSON document addressed by its `id` field.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub body: Value,
}

impl Record {
    /// Build a record from a parsed JSON value.
    ///
    /// The value must be an object with a non-empty string `id`; anything
    /// else fails before a write is ever attempted.
    pub fn from_value(value: Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| DocsinkError::Decode(format!("record is not a JSON object: {value}")))?;

        let id = match obj.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::String(_)) => {
                return Err(DocsinkError::Validation("record has an empty id".to_string()))
            },
            Some(other) => {
                return Err(DocsinkError::Validation(format!(
                    "record id is not a string: {other}"
                )))
            },
            None => return Err(DocsinkError::Validation("record has no id field".to_string())),
        };

        Ok(Record { id, body: value })
    }
}

/// Decode a raw blob payload into records.
///
/// A single top-level object yields one record; an array of N objects yields
/// exactly N records. Invalid JSON aborts the run.
pub fn records_from_payload(payload: &[u8]) -> Result<Vec<Record>> {
    let value: Value = serde_json::from_slice(payload)?;

    let entries = match value {
        Value::Array(entries) => entries,
        obj @ Value::Object(_) => vec![obj],
        other => {
            return Err(DocsinkError::Decode(format!(
                "payload is neither a JSON object nor an array: {other}"
            )))
        },
    };

    entries.into_iter().map(Record::from_value).collect()
}
