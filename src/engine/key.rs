//! Key values and key-seek comparators
//!
//! Key parts are derived from JSON column values and carry a total order:
//! Null < Bool < Int < Float < String.
//! A key tuple may be shorter than the index it is used against; comparisons
//! then only look at the leading parts (prefix semantics).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One key part.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    /// SQL NULL sorts before everything
    Null,
    /// Boolean value (false < true)
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value (stored as bits for total ordering)
    Float(u64),
    /// String value
    String(String),
}

impl KeyPart {
    /// Create a key part from a float
    ///
    /// Uses bit representation for total ordering.
    pub fn from_float(v: f64) -> Self {
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 {
            !bits
        } else {
            bits ^ (1 << 63)
        };
        KeyPart::Float(ordered)
    }

    /// Create a key part from a JSON scalar.
    ///
    /// Arrays and objects cannot be key parts.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(KeyPart::Null),
            Value::Bool(b) => Some(KeyPart::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(KeyPart::Int(i))
                } else {
                    n.as_f64().map(KeyPart::from_float)
                }
            }
            Value::String(s) => Some(KeyPart::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// An ordered list of key parts
pub type KeyTuple = Vec<KeyPart>;

/// Convert JSON key values into a key tuple.
///
/// Returns None if any value is not a scalar.
pub fn key_from_json(values: &[Value]) -> Option<KeyTuple> {
    values.iter().map(KeyPart::from_json).collect()
}

/// Compare the leading `prefix.len()` parts of `key` against `prefix`.
///
/// A key shorter than the prefix compares on what it has, then as smaller.
pub fn compare_prefix(key: &[KeyPart], prefix: &[KeyPart]) -> Ordering {
    let n = prefix.len().min(key.len());
    match key[..n].cmp(&prefix[..n]) {
        Ordering::Equal => key.len().min(prefix.len()).cmp(&prefix.len()),
        other => other,
    }
}

/// How a key seek positions the cursor relative to the search key.
///
/// Variant order matches the engine's key-read function codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyComparator {
    /// First record whose key equals the search key
    #[serde(rename = "=")]
    Exact,
    /// First record whose key is >= the search key
    #[serde(rename = ">=")]
    GreaterOrEqual,
    /// Last record whose key is <= the search key
    #[serde(rename = "<=")]
    LessOrEqual,
    /// First record whose key is > the search key
    #[serde(rename = ">")]
    StrictlyGreater,
    /// Last record whose key is < the search key
    #[serde(rename = "<")]
    StrictlyLess,
    /// First record whose key starts with the search prefix
    #[serde(rename = "prefix")]
    PrefixFirst,
    /// Last record whose key starts with the search prefix
    #[serde(rename = "prefix_last")]
    PrefixLast,
    /// Last record whose key starts with, or sorts before, the search prefix
    #[serde(rename = "prefix_last_or_less")]
    PrefixLastOrLess,
}

impl KeyComparator {
    /// All comparators in code order
    pub const ALL: [KeyComparator; 8] = [
        KeyComparator::Exact,
        KeyComparator::GreaterOrEqual,
        KeyComparator::LessOrEqual,
        KeyComparator::StrictlyGreater,
        KeyComparator::StrictlyLess,
        KeyComparator::PrefixFirst,
        KeyComparator::PrefixLast,
        KeyComparator::PrefixLastOrLess,
    ];

    /// Returns the operator text used in logs and CLI input
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyComparator::Exact => "=",
            KeyComparator::GreaterOrEqual => ">=",
            KeyComparator::LessOrEqual => "<=",
            KeyComparator::StrictlyGreater => ">",
            KeyComparator::StrictlyLess => "<",
            KeyComparator::PrefixFirst => "prefix",
            KeyComparator::PrefixLast => "prefix_last",
            KeyComparator::PrefixLastOrLess => "prefix_last_or_less",
        }
    }
}
