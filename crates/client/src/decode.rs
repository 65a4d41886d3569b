//! Resilient decoding of loosely-typed API payloads
//!
//! The platform represents a record either as an object with named fields
//! or as a fixed-position array of heterogeneous values, some of which may
//! be `null`. Both shapes are decoded through the same declarative field
//! table: each entity type supplies one `&[FieldSpec]` naming where every
//! destination field comes from (key or index) and what it should coerce
//! to. A field that is absent or of an unexpected type produces a warning
//! and a zero value instead of aborting the record; only a missing
//! fatal-marked field (a field without which the record has no identity)
//! or an unusable envelope aborts the fetch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{RedquillError, Result, Warned, Warning};

/// Where a destination field comes from in the source envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Named member of an object-shaped record.
    Key(&'static str),
    /// Fixed position in an array-shaped record.
    Index(usize),
}

/// The semantic type a source value is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// UTF-8 text.
    Text,
    /// Signed integer; JSON floats with no fractional part are accepted.
    Integer,
    /// Point in time. Both encodings the platform emits are recognized:
    /// epoch milliseconds (integer) and ISO-8601 with fractional seconds.
    Timestamp,
    /// List of text values; non-text elements warn and are skipped.
    TextList,
    /// Boolean flag.
    Flag,
}

/// One row of an entity's field table.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Destination field name, used in warnings and for record access.
    pub name: &'static str,
    /// Source position or key in the envelope.
    pub source: FieldSource,
    /// Target semantic type.
    pub kind: FieldKind,
    /// Whether absence aborts the record. Reserved for fields without
    /// which the record has no identity, e.g. a primary key.
    pub fatal: bool,
}

/// A coerced field value. `Absent` is the zero value every accessor maps
/// onto its type's default.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Coerced text.
    Text(String),
    /// Coerced integer.
    Integer(i64),
    /// Coerced timestamp.
    Timestamp(DateTime<Utc>),
    /// Coerced text list.
    TextList(Vec<String>),
    /// Coerced flag.
    Flag(bool),
    /// The source value was absent, `null`, or failed coercion.
    Absent,
}

/// A decoded record: one typed value per field-table row.
///
/// Accessors return the type's zero value for fields that were absent or
/// failed coercion, mirroring the warnings the decode produced for them.
#[derive(Debug, Default)]
pub struct DecodedRecord {
    values: BTreeMap<&'static str, FieldValue>,
}

impl DecodedRecord {
    /// Text field, empty when absent.
    #[must_use]
    pub fn text(&self, name: &str) -> String {
        match self.values.get(name) {
            Some(FieldValue::Text(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// Integer field, zero when absent.
    #[must_use]
    pub fn integer(&self, name: &str) -> i64 {
        match self.values.get(name) {
            Some(FieldValue::Integer(n)) => *n,
            _ => 0,
        }
    }

    /// Timestamp field, `None` when absent.
    #[must_use]
    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.values.get(name) {
            Some(FieldValue::Timestamp(t)) => Some(*t),
            _ => None,
        }
    }

    /// Text-list field, empty when absent.
    #[must_use]
    pub fn text_list(&self, name: &str) -> Vec<String> {
        match self.values.get(name) {
            Some(FieldValue::TextList(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Flag field, false when absent.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FieldValue::Flag(true)))
    }
}

/// Decode one record envelope through a field table.
///
/// Fields that are present and convertible are assigned; fields that are
/// present but not convertible, or absent and non-fatal, warn and stay at
/// their zero value; a fatal-marked field that is absent aborts with a
/// decode error. A `null` source value counts as absent. The record is
/// never partially constructed and then discarded: any record with only
/// non-fatal failures is returned with its warnings attached.
///
/// # Errors
/// Returns a decode error if the envelope is neither an object nor an
/// array, or if a fatal-marked field is absent.
pub fn decode(envelope: &Value, specs: &[FieldSpec]) -> Result<Warned<DecodedRecord>> {
    if !envelope.is_object() && !envelope.is_array() {
        return Err(RedquillError::Decode(format!(
            "record envelope is neither an object nor an array: {envelope}"
        )));
    }

    let mut record = DecodedRecord::default();
    let mut warnings = Vec::new();

    for spec in specs {
        let source = match spec.source {
            FieldSource::Key(key) => envelope.get(key),
            FieldSource::Index(index) => envelope.get(index),
        }
        .filter(|value| !value.is_null());

        let Some(value) = source else {
            if spec.fatal {
                return Err(RedquillError::Decode(format!(
                    "record is missing required field `{}` ({})",
                    spec.name,
                    describe_source(spec.source),
                )));
            }
            warnings.push(Warning::new(format!(
                "field `{}` is missing ({})",
                spec.name,
                describe_source(spec.source),
            )));
            record.values.insert(spec.name, FieldValue::Absent);
            continue;
        };

        let coerced = coerce(spec, value, &mut warnings);
        record.values.insert(spec.name, coerced);
    }

    Ok(Warned::new(record, warnings))
}

fn describe_source(source: FieldSource) -> String {
    match source {
        FieldSource::Key(key) => format!("key `{key}`"),
        FieldSource::Index(index) => format!("position {index}"),
    }
}

/// Coerce one source value, pushing a warning and returning `Absent` on
/// failure.
fn coerce(spec: &FieldSpec, value: &Value, warnings: &mut Vec<Warning>) -> FieldValue {
    match spec.kind {
        FieldKind::Text => match value.as_str() {
            Some(s) => FieldValue::Text(s.to_string()),
            None => miscoerced(spec, value, "text", warnings),
        },
        FieldKind::Integer => match as_integer(value) {
            Some(n) => FieldValue::Integer(n),
            None => miscoerced(spec, value, "an integer", warnings),
        },
        FieldKind::Timestamp => match as_timestamp(value) {
            Some(t) => FieldValue::Timestamp(t),
            None => miscoerced(spec, value, "a timestamp", warnings),
        },
        FieldKind::TextList => match value.as_array() {
            Some(items) => {
                let mut texts = Vec::with_capacity(items.len());
                for (position, item) in items.iter().enumerate() {
                    match item.as_str() {
                        Some(s) => texts.push(s.to_string()),
                        None => warnings.push(Warning::new(format!(
                            "couldn't coerce `{}`[{position}] {item} into text",
                            spec.name,
                        ))),
                    }
                }
                FieldValue::TextList(texts)
            }
            None => miscoerced(spec, value, "a text list", warnings),
        },
        FieldKind::Flag => match value.as_bool() {
            Some(b) => FieldValue::Flag(b),
            None => miscoerced(spec, value, "a flag", warnings),
        },
    }
}

fn miscoerced(
    spec: &FieldSpec,
    value: &Value,
    wanted: &str,
    warnings: &mut Vec<Warning>,
) -> FieldValue {
    warnings.push(Warning::new(format!(
        "couldn't coerce field `{}` ({}) {value} into {wanted}",
        spec.name,
        describe_source(spec.source),
    )));
    FieldValue::Absent
}

fn as_integer(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    // The platform serializes some counters as floats.
    value.as_f64().filter(|f| f.fract() == 0.0 && f.is_finite()).map(|f| f as i64)
}

/// Recognize both timestamp encodings the platform emits.
fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    if let Some(millis) = value.as_i64() {
        return DateTime::from_timestamp_millis(millis);
    }
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// Extract the service-reported error message from an envelope, if any.
///
/// The platform signals failure with an overall `status: "error"` field
/// and a human-readable `message`, on otherwise well-formed bodies.
#[must_use]
pub fn envelope_error(envelope: &Value) -> Option<String> {
    if envelope.get("status").and_then(Value::as_str) != Some("error") {
        return None;
    }
    Some(
        envelope
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("service reported an error with no message")
            .to_string(),
    )
}
