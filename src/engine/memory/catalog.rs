//! Shared in-memory catalog
//!
//! The catalog is the only state shared between sessions. Administrative
//! calls on it (alter, flush, exclusive lock requests, row deletion) are how
//! other sessions invalidate a handle. Rows can also be marked corrupt so
//! that reading them fails.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::engine::table::{IndexDescriptor, Row, TableDescriptor, TableKey};

#[derive(Debug, Clone)]
pub(crate) struct StoredRow {
    pub(crate) row: Row,
    pub(crate) deleted: bool,
    /// Reading this row fails with an engine error
    pub(crate) corrupt: bool,
}

/// One table held by the memory engine
#[derive(Debug, Clone)]
pub struct MemoryTable {
    pub(crate) descriptor: TableDescriptor,
    pub(crate) rows: Vec<StoredRow>,
    pub(crate) version: u64,
    pub(crate) direct_access: bool,
    pub(crate) partitions: usize,
    pub(crate) temporary: bool,
}

impl MemoryTable {
    pub fn new(schema: &str, table: &str, columns: &[&str]) -> Self {
        Self {
            descriptor: TableDescriptor {
                schema: schema.to_string(),
                table: table.to_string(),
                columns: columns.iter().map(|c| c.to_string()).collect(),
                indexes: Vec::new(),
            },
            rows: Vec::new(),
            version: 1,
            direct_access: true,
            partitions: 1,
            temporary: false,
        }
    }

    pub fn with_index(mut self, name: &str, columns: &[&str]) -> Self {
        self.descriptor.indexes.push(IndexDescriptor::new(name, columns));
        self
    }

    /// Append rows. Values that are not JSON objects are skipped.
    pub fn with_rows<I: IntoIterator<Item = Value>>(mut self, rows: I) -> Self {
        self.rows.extend(rows.into_iter().filter_map(Row::from_json).map(|row| StoredRow {
            row,
            deleted: false,
            corrupt: false,
        }));
        self
    }

    /// Simulate a merge/partitioned object made of `n` physical tables
    pub fn partitioned(mut self, n: usize) -> Self {
        self.partitions = n.max(1);
        self
    }

    /// Engine flag: direct positional access not allowed
    pub fn without_direct_access(mut self) -> Self {
        self.direct_access = false;
        self
    }

    pub fn temporary(mut self) -> Self {
        self.temporary = true;
        self
    }

    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

fn default_true() -> bool {
    true
}

fn default_partitions() -> usize {
    1
}

/// JSON fixture describing a table, used by the CLI
#[derive(Debug, Clone, Deserialize)]
pub struct TableFixture {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub indexes: Vec<IndexDescriptor>,
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
    #[serde(default = "default_true")]
    pub direct_access: bool,
    #[serde(default = "default_partitions")]
    pub partitions: usize,
    #[serde(default)]
    pub temporary: bool,
}

impl From<TableFixture> for MemoryTable {
    fn from(fixture: TableFixture) -> Self {
        let columns: Vec<&str> = fixture.columns.iter().map(String::as_str).collect();
        let mut table = MemoryTable::new(&fixture.schema, &fixture.table, &columns)
            .with_rows(fixture.rows.into_iter().map(Value::Object))
            .partitioned(fixture.partitions);
        table.descriptor.indexes = fixture.indexes;
        table.direct_access = fixture.direct_access;
        table.temporary = fixture.temporary;
        table
    }
}

#[derive(Debug, Default)]
pub(crate) struct CatalogState {
    pub(crate) tables: BTreeMap<TableKey, MemoryTable>,
    pub(crate) next_ticket: u64,
    /// Outstanding lock tickets by id
    pub(crate) granted: HashMap<u64, TableKey>,
    /// Tables another session is waiting to lock exclusively
    pub(crate) pending_exclusive: HashSet<TableKey>,
    /// Tables another session holds exclusively
    pub(crate) exclusive_holders: HashSet<TableKey>,
    pub(crate) refresh_broadcasts: u64,
    pub(crate) definition_lock_held: bool,
}

/// Handle on the shared catalog. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    inner: Arc<Mutex<CatalogState>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables<I: IntoIterator<Item = MemoryTable>>(tables: I) -> Self {
        let catalog = Self::new();
        for table in tables {
            catalog.create_table(table);
        }
        catalog
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, CatalogState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or replace a table
    pub fn create_table(&self, table: MemoryTable) {
        let key = table.descriptor.key();
        self.state().tables.insert(key, table);
    }

    pub fn drop_table(&self, schema: &str, table: &str) -> bool {
        self.state().tables.remove(&TableKey::new(schema, table)).is_some()
    }

    /// Bump the definition version, as a schema change would
    pub fn alter_table(&self, schema: &str, table: &str) -> bool {
        match self.state().tables.get_mut(&TableKey::new(schema, table)) {
            Some(t) => {
                t.version += 1;
                true
            }
            None => false,
        }
    }

    /// Bump every table version, as a global table flush would
    pub fn flush_tables(&self) {
        for table in self.state().tables.values_mut() {
            table.version += 1;
        }
    }

    /// Another session starts waiting for an exclusive lock
    pub fn request_exclusive(&self, schema: &str, table: &str) {
        self.state()
            .pending_exclusive
            .insert(TableKey::new(schema, table));
    }

    pub fn withdraw_exclusive(&self, schema: &str, table: &str) {
        self.state()
            .pending_exclusive
            .remove(&TableKey::new(schema, table));
    }

    /// Another session holds an exclusive lock; lock requests time out
    pub fn hold_exclusive(&self, schema: &str, table: &str) {
        self.state()
            .exclusive_holders
            .insert(TableKey::new(schema, table));
    }

    pub fn release_exclusive(&self, schema: &str, table: &str) {
        self.state()
            .exclusive_holders
            .remove(&TableKey::new(schema, table));
    }

    /// Mark the row at `position` (insertion order) as deleted
    pub fn delete_row(&self, schema: &str, table: &str, position: usize) -> bool {
        let mut state = self.state();
        match state
            .tables
            .get_mut(&TableKey::new(schema, table))
            .and_then(|t| t.rows.get_mut(position))
        {
            Some(stored) => {
                stored.deleted = true;
                true
            }
            None => false,
        }
    }

    /// Mark the row at `position` as unreadable
    pub fn corrupt_row(&self, schema: &str, table: &str, position: usize) -> bool {
        let mut state = self.state();
        match state
            .tables
            .get_mut(&TableKey::new(schema, table))
            .and_then(|t| t.rows.get_mut(position))
        {
            Some(stored) => {
                stored.corrupt = true;
                true
            }
            None => false,
        }
    }

    pub fn insert_row(&self, schema: &str, table: &str, row: Row) -> bool {
        match self.state().tables.get_mut(&TableKey::new(schema, table)) {
            Some(t) => {
                t.rows.push(StoredRow {
                    row,
                    deleted: false,
                    corrupt: false,
                });
                true
            }
            None => false,
        }
    }

    pub fn table_version(&self, schema: &str, table: &str) -> Option<u64> {
        self.state()
            .tables
            .get(&TableKey::new(schema, table))
            .map(|t| t.version)
    }

    pub fn descriptors(&self) -> Vec<TableDescriptor> {
        self.state()
            .tables
            .values()
            .map(|t| t.descriptor.clone())
            .collect()
    }

    /// Number of lock tickets granted and not yet released
    pub fn outstanding_locks(&self) -> usize {
        self.state().granted.len()
    }

    pub fn outstanding_locks_on(&self, schema: &str, table: &str) -> usize {
        let key = TableKey::new(schema, table);
        self.state().granted.values().filter(|k| **k == key).count()
    }

    pub fn refresh_broadcasts(&self) -> u64 {
        self.state().refresh_broadcasts
    }

    /// Simulate the caller holding the global table-definition lock
    pub fn set_definition_lock(&self, held: bool) {
        self.state().definition_lock_held = held;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alter_bumps_version() {
        let catalog = MemoryCatalog::with_tables([MemoryTable::new("test", "t1", &["id"])]);
        assert_eq!(catalog.table_version("test", "t1"), Some(1));
        assert!(catalog.alter_table("TEST", "T1"));
        assert_eq!(catalog.table_version("test", "t1"), Some(2));
        assert!(!catalog.alter_table("test", "missing"));
    }

    #[test]
    fn test_flush_bumps_all_versions() {
        let catalog = MemoryCatalog::with_tables([
            MemoryTable::new("test", "a", &["id"]),
            MemoryTable::new("test", "b", &["id"]),
        ]);
        catalog.flush_tables();
        assert_eq!(catalog.table_version("test", "a"), Some(2));
        assert_eq!(catalog.table_version("test", "b"), Some(2));
    }

    #[test]
    fn test_delete_and_insert_row() {
        let catalog = MemoryCatalog::with_tables([
            MemoryTable::new("test", "t1", &["id"]).with_rows([json!({"id": 1})])
        ]);
        assert!(catalog.delete_row("test", "t1", 0));
        assert!(!catalog.delete_row("test", "t1", 5));
        assert!(catalog.corrupt_row("test", "t1", 0));
        assert!(!catalog.corrupt_row("test", "nope", 0));
        assert!(catalog.insert_row("test", "t1", Row::from_json(json!({"id": 2})).unwrap()));
        assert_eq!(catalog.state().tables[&TableKey::new("test", "t1")].row_count(), 2);
    }

    #[test]
    fn test_fixture_conversion() {
        let fixture: TableFixture = serde_json::from_value(json!({
            "schema": "test",
            "table": "t1",
            "columns": ["id", "name"],
            "indexes": [{"name": "PRIMARY", "columns": ["id"]}],
            "rows": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]
        }))
        .unwrap();
        let table = MemoryTable::from(fixture);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.descriptor().indexes.len(), 1);
        assert!(table.direct_access);
        assert_eq!(table.partitions, 1);
        assert!(!table.temporary);
    }
}
