//! Memory engine cursor
//!
//! Scan order is fixed when a scan is initialised: index scans sort row
//! positions by key (stable, so duplicates keep insertion order), full scans
//! use insertion order. Rows are read live from the catalog, so a row deleted
//! after the scan started reports `RecordDeleted`.

use std::cmp::Ordering;

use crate::engine::cursor::{EngineCursor, Fetch, ScanTarget};
use crate::engine::errors::{EngineError, EngineResult};
use crate::engine::key::{compare_prefix, KeyComparator, KeyPart, KeyTuple};
use crate::engine::table::{TableDescriptor, TableKey};

use super::catalog::MemoryCatalog;

/// Engine error number for a primitive used without a suitable scan
pub const ERR_SCAN_NOT_INITIALISED: i32 = 1030;
/// Engine error number for an index position that does not exist
pub const ERR_WRONG_INDEX: i32 = 124;
/// Engine error number for a row that cannot be read
pub const ERR_RECORD_CRASHED: i32 = 126;

#[derive(Debug)]
struct ActiveScan {
    target: ScanTarget,
    /// (key, row position) in scan order
    entries: Vec<(KeyTuple, usize)>,
    /// Current entry; Some(len) means past the end
    pos: Option<usize>,
}

/// Cursor over one memory table (or one partition of it)
#[derive(Debug)]
pub struct MemoryCursor {
    catalog: MemoryCatalog,
    key: TableKey,
    descriptor: TableDescriptor,
    version: u64,
    partition: usize,
    direct_access: bool,
    temporary: bool,
    marked: bool,
    scan: Option<ActiveScan>,
}

impl MemoryCursor {
    pub(crate) fn new(
        catalog: MemoryCatalog,
        descriptor: TableDescriptor,
        version: u64,
        partition: usize,
        direct_access: bool,
        temporary: bool,
    ) -> Self {
        Self {
            catalog,
            key: descriptor.key(),
            descriptor,
            version,
            partition,
            direct_access,
            temporary,
            marked: false,
            scan: None,
        }
    }

    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Whether the cursor was handed over to a direct handle
    pub fn is_marked_for_direct_access(&self) -> bool {
        self.marked
    }

    fn scan_mut(&mut self) -> EngineResult<&mut ActiveScan> {
        self.scan.as_mut().ok_or_else(|| {
            EngineError::engine(ERR_SCAN_NOT_INITIALISED, "no scan initialised on cursor")
        })
    }

    fn index_scan_mut(&mut self) -> EngineResult<&mut ActiveScan> {
        let scan = self.scan_mut()?;
        match scan.target {
            ScanTarget::Index(_) => Ok(scan),
            ScanTarget::Full => Err(EngineError::engine(
                ERR_SCAN_NOT_INITIALISED,
                "operation requires an index scan",
            )),
        }
    }

    /// Read the row at scan entry `pos`
    fn fetch(&self, pos: usize) -> EngineResult<Fetch> {
        let row_pos = match self.scan.as_ref().and_then(|s| s.entries.get(pos)) {
            Some((_, row_pos)) => *row_pos,
            None => return Ok(Fetch::EndOfScan),
        };

        let state = self.catalog.state();
        let table = state
            .tables
            .get(&self.key)
            .ok_or_else(|| EngineError::NoSuchTable(self.key.to_string()))?;

        match table.rows.get(row_pos) {
            Some(stored) if stored.deleted => Ok(Fetch::RecordDeleted),
            Some(stored) if stored.corrupt => Err(EngineError::engine(
                ERR_RECORD_CRASHED,
                format!("row {} of {} is marked as crashed", row_pos, self.key),
            )),
            Some(stored) => Ok(Fetch::Row(stored.row.clone())),
            None => Ok(Fetch::EndOfScan),
        }
    }

    fn move_to(&mut self, pos: Option<usize>) -> EngineResult<Fetch> {
        let scan = self.scan_mut()?;
        scan.pos = pos;
        match pos {
            Some(p) if p < scan.entries.len() => self.fetch(p),
            _ => Ok(Fetch::EndOfScan),
        }
    }
}

impl EngineCursor for MemoryCursor {
    fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn is_temporary(&self) -> bool {
        self.temporary
    }

    fn supports_direct_access(&self) -> bool {
        self.direct_access
    }

    fn mark_for_direct_access(&mut self) {
        self.marked = true;
    }

    fn needs_reopen(&self) -> bool {
        match self.catalog.state().tables.get(&self.key) {
            Some(table) => table.version != self.version,
            None => true,
        }
    }

    fn active_scan(&self) -> Option<ScanTarget> {
        self.scan.as_ref().map(|s| s.target)
    }

    fn init_scan(&mut self, target: ScanTarget) -> EngineResult<()> {
        let index = match target {
            ScanTarget::Index(idx) => Some(self.descriptor.index(idx).cloned().ok_or_else(|| {
                EngineError::engine(ERR_WRONG_INDEX, format!("no index {} on {}", idx, self.key))
            })?),
            ScanTarget::Full => None,
        };

        let entries = {
            let state = self.catalog.state();
            let table = state
                .tables
                .get(&self.key)
                .ok_or_else(|| EngineError::NoSuchTable(self.key.to_string()))?;

            let mut entries: Vec<(KeyTuple, usize)> = table
                .rows
                .iter()
                .enumerate()
                .map(|(pos, stored)| match &index {
                    Some(idx) => (stored.row.key_for(idx), pos),
                    None => (Vec::new(), pos),
                })
                .collect();
            if index.is_some() {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
            }
            entries
        };

        self.scan = Some(ActiveScan {
            target,
            entries,
            pos: None,
        });
        Ok(())
    }

    fn end_scan(&mut self) {
        self.scan = None;
    }

    fn position_first(&mut self) -> EngineResult<Fetch> {
        self.move_to(Some(0))
    }

    fn position_last(&mut self) -> EngineResult<Fetch> {
        let len = self.index_scan_mut()?.entries.len();
        self.move_to(len.checked_sub(1))
    }

    fn position_next(&mut self) -> EngineResult<Fetch> {
        let scan = self.scan_mut()?;
        let next = match scan.pos {
            None => 0,
            Some(p) => (p + 1).min(scan.entries.len()),
        };
        self.move_to(Some(next))
    }

    fn position_prev(&mut self) -> EngineResult<Fetch> {
        let scan = self.index_scan_mut()?;
        let prev = match scan.pos {
            None | Some(0) => None,
            Some(p) => Some(p - 1),
        };
        self.move_to(prev)
    }

    fn position_next_same_prefix(&mut self, key: &[KeyPart]) -> EngineResult<Fetch> {
        let scan = self.index_scan_mut()?;
        let next = scan.pos.map_or(0, |p| (p + 1).min(scan.entries.len()));
        let same = scan
            .entries
            .get(next)
            .map(|(k, _)| compare_prefix(k, key) == Ordering::Equal)
            .unwrap_or(false);
        if !same {
            scan.pos = Some(scan.entries.len());
            return Ok(Fetch::EndOfScan);
        }
        self.move_to(Some(next))
    }

    fn position_by_key(
        &mut self,
        key: &[KeyPart],
        comparator: KeyComparator,
    ) -> EngineResult<Fetch> {
        let scan = self.index_scan_mut()?;
        let len = scan.entries.len();
        let lower = scan
            .entries
            .partition_point(|(k, _)| compare_prefix(k, key) == Ordering::Less);
        let upper = scan
            .entries
            .partition_point(|(k, _)| compare_prefix(k, key) != Ordering::Greater);

        let found = match comparator {
            KeyComparator::Exact | KeyComparator::PrefixFirst => (lower < upper).then_some(lower),
            KeyComparator::GreaterOrEqual => (lower < len).then_some(lower),
            KeyComparator::StrictlyGreater => (upper < len).then_some(upper),
            KeyComparator::LessOrEqual | KeyComparator::PrefixLastOrLess => upper.checked_sub(1),
            KeyComparator::StrictlyLess => lower.checked_sub(1),
            KeyComparator::PrefixLast => (lower < upper).then(|| upper - 1),
        };

        match found {
            Some(pos) => self.move_to(Some(pos)),
            None => {
                scan.pos = None;
                Ok(Fetch::KeyNotFound)
            }
        }
    }
}
