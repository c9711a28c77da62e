//! Record model
//!
//! Records are flat maps from field name to a scalar [`Value`]. Pages and
//! index shards are maps keyed by record id; `BTreeMap` keeps their JSON
//! rendering stable.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::Error as _;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Result, ShelfError};

/// Identifier of a page file inside a blob (`<uuid>.json`)
pub type PageId = String;

/// Identifier of an index shard file inside a blob (`<uuid>.json`)
pub type ShardId = String;

/// Bucket identifier produced by routing (`<digests>.json`)
pub type HashKey = String;

/// A single record: field name → value
pub type Record = BTreeMap<String, Value>;

/// Content of a page: record id → record
pub type PageRecords = BTreeMap<String, Record>;

/// Content of an index shard: record id → page id
pub type IndexRecords = BTreeMap<String, PageId>;

/// Scalar field value
///
/// Serialized untagged, so a record reads as plain JSON:
/// `{"col1": 2, "col2": "text"}`. JSON has no encoding for NaN or the
/// infinities, so serializing a non-finite float is an error.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// False for NaN and infinite floats, which cannot be persisted
    pub fn is_storable(&self) -> bool {
        !matches!(self, Value::Float(x) if !x.is_finite())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) if x.is_finite() => serializer.serialize_f64(*x),
            Value::Float(x) => Err(S::Error::custom(format!("non-finite float {}", x))),
            Value::String(s) => serializer.serialize_str(s),
        }
    }
}

/// Canonical textual rendering used for routing
///
/// The same value always renders to the same bytes. Floats use the shortest
/// representation that round-trips, so `1.0` renders as `1`, and both zeros
/// render as `0`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) if *x == 0.0 => f.write_str("0"),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
        }
    }
}

/// Reject records holding values that cannot be persisted
pub fn check_record(record: &Record) -> Result<()> {
    match record.iter().find(|(_, value)| !value.is_storable()) {
        Some((field, value)) => Err(ShelfError::InvalidValue {
            field: field.clone(),
            value: value.to_string(),
        }),
        None => Ok(()),
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}
