//! In-memory reference engine
//!
//! Implements every collaborator the handler subsystem consumes:
//! - [`MemoryOpener`]: open-and-lock over a shared [`MemoryCatalog`]
//! - [`MemoryCursor`]: index and full scans over catalog rows
//! - [`MemoryLocks`]: one session's lock context
//!
//! No persistence and no isolation. Used by tests and the CLI session driver.

mod catalog;
mod cursor;
mod locks;

pub use catalog::{MemoryCatalog, MemoryTable, TableFixture};
pub use cursor::{MemoryCursor, ERR_RECORD_CRASHED, ERR_SCAN_NOT_INITIALISED, ERR_WRONG_INDEX};
pub use locks::MemoryLocks;

use crate::engine::cursor::EngineCursor;
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::lock::{LockContext, LockRequest};
use crate::engine::opener::TableOpener;
use crate::engine::table::TableKey;
use crate::handler::HandleName;

/// Table opener over a memory catalog
#[derive(Debug, Clone)]
pub struct MemoryOpener {
    catalog: MemoryCatalog,
}

impl MemoryOpener {
    pub fn new(catalog: MemoryCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &MemoryCatalog {
        &self.catalog
    }
}

impl TableOpener for MemoryOpener {
    type Cursor = MemoryCursor;

    fn open_and_lock<L: LockContext>(
        &mut self,
        name: &HandleName,
        locks: &mut L,
    ) -> EngineResult<Vec<MemoryCursor>> {
        let key = TableKey::new(name.schema(), name.table());

        // Copy what we need; acquire() below takes the catalog mutex again.
        let (descriptor, version, partitions, direct_access, temporary) = {
            let state = self.catalog.state();
            let table = state
                .tables
                .get(&key)
                .ok_or_else(|| EngineError::NoSuchTable(key.to_string()))?;
            (
                table.descriptor.clone(),
                table.version,
                table.partitions,
                table.direct_access,
                table.temporary,
            )
        };

        if !temporary {
            locks.acquire(&LockRequest::metadata(key))?;
        }

        Ok((0..partitions)
            .map(|partition| {
                MemoryCursor::new(
                    self.catalog.clone(),
                    descriptor.clone(),
                    version,
                    partition,
                    direct_access,
                    temporary,
                )
            })
            .collect())
    }

    fn close_table(&mut self, cursor: MemoryCursor) -> bool {
        let stale = cursor.needs_reopen();
        if stale {
            self.catalog.state().refresh_broadcasts += 1;
        }
        stale
    }

    fn holds_definition_lock(&self) -> bool {
        self.catalog.state().definition_lock_held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::cursor::{Fetch, ScanTarget};
    use crate::engine::key::{KeyComparator, KeyPart};
    use crate::engine::table::KeyIndex;
    use serde_json::{json, Value};

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::with_tables([MemoryTable::new("test", "t1", &["id", "grp"])
            .with_index("PRIMARY", &["id"])
            .with_index("by_grp", &["grp", "id"])
            .with_rows([
                json!({"id": 3, "grp": "b"}),
                json!({"id": 1, "grp": "a"}),
                json!({"id": 4, "grp": "b"}),
                json!({"id": 2, "grp": "a"}),
                json!({"id": 5, "grp": "c"}),
            ])])
    }

    fn open(catalog: &MemoryCatalog) -> MemoryCursor {
        let mut opener = MemoryOpener::new(catalog.clone());
        let mut locks = MemoryLocks::new(catalog.clone());
        let mut cursors = opener
            .open_and_lock(&HandleName::new("test", "t1"), &mut locks)
            .unwrap();
        cursors.pop().unwrap()
    }

    fn id(fetch: Fetch) -> Value {
        match fetch {
            Fetch::Row(row) => row.get("id").cloned().unwrap_or(Value::Null),
            other => panic!("expected row, got {:?}", other),
        }
    }

    #[test]
    fn test_open_missing_table() {
        let catalog = catalog();
        let mut opener = MemoryOpener::new(catalog.clone());
        let mut locks = MemoryLocks::new(catalog);
        let err = opener
            .open_and_lock(&HandleName::new("test", "nope"), &mut locks)
            .unwrap_err();
        assert_eq!(err, EngineError::NoSuchTable("test.nope".into()));
    }

    #[test]
    fn test_open_takes_metadata_lock() {
        let catalog = catalog();
        let mut opener = MemoryOpener::new(catalog.clone());
        let mut locks = MemoryLocks::new(catalog.clone());
        opener
            .open_and_lock(&HandleName::new("test", "t1"), &mut locks)
            .unwrap();
        assert_eq!(locks.held().len(), 1);
        assert_eq!(catalog.outstanding_locks_on("test", "t1"), 1);
    }

    #[test]
    fn test_partitioned_open_yields_many_cursors() {
        let catalog = MemoryCatalog::with_tables([MemoryTable::new("test", "m", &["id"]).partitioned(3)]);
        let mut opener = MemoryOpener::new(catalog.clone());
        let mut locks = MemoryLocks::new(catalog);
        let cursors = opener
            .open_and_lock(&HandleName::new("test", "m"), &mut locks)
            .unwrap();
        assert_eq!(cursors.len(), 3);
        assert_eq!(cursors[2].partition(), 2);
    }

    #[test]
    fn test_full_scan_in_insertion_order() {
        let catalog = catalog();
        let mut cursor = open(&catalog);
        cursor.init_scan(ScanTarget::Full).unwrap();
        assert_eq!(id(cursor.position_first().unwrap()), json!(3));
        assert_eq!(id(cursor.position_next().unwrap()), json!(1));
        assert_eq!(id(cursor.position_next().unwrap()), json!(4));
        assert_eq!(id(cursor.position_next().unwrap()), json!(2));
        assert_eq!(id(cursor.position_next().unwrap()), json!(5));
        assert_eq!(cursor.position_next().unwrap(), Fetch::EndOfScan);
        assert_eq!(cursor.position_next().unwrap(), Fetch::EndOfScan);
    }

    #[test]
    fn test_index_scan_both_directions() {
        let catalog = catalog();
        let mut cursor = open(&catalog);
        cursor.init_scan(ScanTarget::Index(KeyIndex(0))).unwrap();
        assert_eq!(id(cursor.position_last().unwrap()), json!(5));
        assert_eq!(id(cursor.position_prev().unwrap()), json!(4));
        assert_eq!(id(cursor.position_first().unwrap()), json!(1));
        assert_eq!(cursor.position_prev().unwrap(), Fetch::EndOfScan);
        assert_eq!(id(cursor.position_next().unwrap()), json!(1));
    }

    #[test]
    fn test_full_scan_rejects_backward() {
        let catalog = catalog();
        let mut cursor = open(&catalog);
        cursor.init_scan(ScanTarget::Full).unwrap();
        assert_eq!(
            cursor.position_prev().unwrap_err().engine_code(),
            Some(ERR_SCAN_NOT_INITIALISED)
        );
    }

    #[test]
    fn test_primitives_need_a_scan() {
        let catalog = catalog();
        let mut cursor = open(&catalog);
        assert!(cursor.position_first().is_err());
        assert!(cursor.init_scan(ScanTarget::Index(KeyIndex(9))).is_err());
    }

    #[test]
    fn test_position_by_key_comparators() {
        let catalog = catalog();
        let mut cursor = open(&catalog);
        cursor.init_scan(ScanTarget::Index(KeyIndex(0))).unwrap();
        let key = [KeyPart::Int(3)];

        let expect = [
            (KeyComparator::Exact, json!(3)),
            (KeyComparator::GreaterOrEqual, json!(3)),
            (KeyComparator::LessOrEqual, json!(3)),
            (KeyComparator::StrictlyGreater, json!(4)),
            (KeyComparator::StrictlyLess, json!(2)),
            (KeyComparator::PrefixFirst, json!(3)),
            (KeyComparator::PrefixLast, json!(3)),
            (KeyComparator::PrefixLastOrLess, json!(3)),
        ];
        for (cmp, want) in expect {
            assert_eq!(id(cursor.position_by_key(&key, cmp).unwrap()), want, "{:?}", cmp);
        }

        assert_eq!(
            cursor
                .position_by_key(&[KeyPart::Int(42)], KeyComparator::Exact)
                .unwrap(),
            Fetch::KeyNotFound
        );
        assert_eq!(
            cursor
                .position_by_key(&[KeyPart::Int(0)], KeyComparator::StrictlyLess)
                .unwrap(),
            Fetch::KeyNotFound
        );
    }

    #[test]
    fn test_prefix_seek_and_same_prefix() {
        let catalog = catalog();
        let mut cursor = open(&catalog);
        cursor.init_scan(ScanTarget::Index(KeyIndex(1))).unwrap();
        let key = [KeyPart::String("b".into())];

        assert_eq!(id(cursor.position_by_key(&key, KeyComparator::Exact).unwrap()), json!(3));
        assert_eq!(id(cursor.position_next_same_prefix(&key).unwrap()), json!(4));
        assert_eq!(cursor.position_next_same_prefix(&key).unwrap(), Fetch::EndOfScan);

        assert_eq!(
            id(cursor.position_by_key(&key, KeyComparator::PrefixLast).unwrap()),
            json!(4)
        );
        assert_eq!(
            id(cursor
                .position_by_key(&[KeyPart::String("bb".into())], KeyComparator::PrefixLastOrLess)
                .unwrap()),
            json!(4)
        );
    }

    #[test]
    fn test_deleted_row_reports_record_deleted() {
        let catalog = catalog();
        let mut cursor = open(&catalog);
        cursor.init_scan(ScanTarget::Full).unwrap();
        catalog.delete_row("test", "t1", 1);
        assert_eq!(id(cursor.position_first().unwrap()), json!(3));
        assert_eq!(cursor.position_next().unwrap(), Fetch::RecordDeleted);
        assert_eq!(id(cursor.position_next().unwrap()), json!(4));
    }

    #[test]
    fn test_corrupt_row_and_dropped_table_fail_with_engine_codes() {
        let catalog = catalog();
        let mut cursor = open(&catalog);
        cursor.init_scan(ScanTarget::Full).unwrap();
        catalog.corrupt_row("test", "t1", 1);
        assert_eq!(id(cursor.position_first().unwrap()), json!(3));
        assert_eq!(
            cursor.position_next().unwrap_err().engine_code(),
            Some(ERR_RECORD_CRASHED)
        );

        catalog.drop_table("test", "t1");
        let err = cursor.position_next().unwrap_err();
        assert_eq!(err, EngineError::NoSuchTable("test.t1".into()));
        assert_eq!(err.engine_code(), Some(crate::engine::ERR_NO_SUCH_TABLE));
    }

    #[test]
    fn test_needs_reopen_and_stale_close() {
        let catalog = catalog();
        let mut opener = MemoryOpener::new(catalog.clone());
        let cursor = open(&catalog);
        assert!(!cursor.needs_reopen());
        catalog.alter_table("test", "t1");
        assert!(cursor.needs_reopen());
        assert!(opener.close_table(cursor));
        assert_eq!(catalog.refresh_broadcasts(), 1);
    }
}
