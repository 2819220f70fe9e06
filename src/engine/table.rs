//! Table metadata and rows as seen through an engine cursor

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::key::{KeyPart, KeyTuple};

/// Position of an index within its table's index list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyIndex(pub usize);

impl fmt::Display for KeyIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Case-insensitive identity of a physical table (schema, table).
///
/// Used for lock bookkeeping and catalog lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    schema: String,
    table: String,
}

impl TableKey {
    pub fn new(schema: &str, table: &str) -> Self {
        Self {
            schema: schema.to_ascii_lowercase(),
            table: table.to_ascii_lowercase(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Index definition: name plus ordered key columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub columns: Vec<String>,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Number of key parts in this index
    pub fn key_parts(&self) -> usize {
        self.columns.len()
    }
}

/// Shape of an opened table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
}

impl TableDescriptor {
    pub fn key(&self) -> TableKey {
        TableKey::new(&self.schema, &self.table)
    }

    /// Resolve an index name (case-insensitive)
    pub fn find_index(&self, name: &str) -> Option<KeyIndex> {
        self.indexes
            .iter()
            .position(|idx| idx.name.eq_ignore_ascii_case(name))
            .map(KeyIndex)
    }

    pub fn index(&self, index: KeyIndex) -> Option<&IndexDescriptor> {
        self.indexes.get(index.0)
    }
}

/// A table row: column name to JSON value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from a JSON object. Non-objects yield None.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Row(map)),
            _ => None,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn set(&mut self, column: impl Into<String>, value: Value) {
        self.0.insert(column.into(), value);
    }

    /// Extract the key tuple for `index`. Missing columns become NULL parts.
    pub fn key_for(&self, index: &IndexDescriptor) -> KeyTuple {
        index
            .columns
            .iter()
            .map(|col| {
                self.get(col)
                    .and_then(KeyPart::from_json)
                    .unwrap_or(KeyPart::Null)
            })
            .collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
