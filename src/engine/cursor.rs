//! Engine cursor contract
//!
//! A cursor is the storage engine's handle on one opened table. The handler
//! subsystem only orchestrates these primitives; it never reads records any
//! other way.

use super::errors::EngineResult;
use super::key::{KeyComparator, KeyPart};
use super::table::{KeyIndex, Row, TableDescriptor};

/// Which kind of scan is initialised on a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTarget {
    /// Ordered scan over one index
    Index(KeyIndex),
    /// Unordered full table scan
    Full,
}

impl ScanTarget {
    pub fn key_index(&self) -> Option<KeyIndex> {
        match self {
            ScanTarget::Index(idx) => Some(*idx),
            ScanTarget::Full => None,
        }
    }
}

/// Non-error outcome of a positioning primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    /// Cursor is positioned on a row
    Row(Row),
    /// Scan ran off either end
    EndOfScan,
    /// Key seek found no qualifying record
    KeyNotFound,
    /// Cursor landed on a record deleted concurrently; try the next one
    RecordDeleted,
}

/// Storage engine cursor primitives
pub trait EngineCursor {
    /// Shape of the table this cursor was opened on
    fn descriptor(&self) -> &TableDescriptor;

    /// Table definition version observed at open time
    fn version(&self) -> u64;

    /// Temporary tables are session-private and carry no lock ticket
    fn is_temporary(&self) -> bool {
        false
    }

    /// Whether the engine allows direct positional access
    fn supports_direct_access(&self) -> bool;

    /// Tell the engine this cursor is owned by a direct handle and must
    /// survive statement boundaries.
    fn mark_for_direct_access(&mut self);

    /// True once the table was flushed or altered after this cursor opened
    fn needs_reopen(&self) -> bool;

    /// Currently initialised scan, if any
    fn active_scan(&self) -> Option<ScanTarget>;

    fn init_scan(&mut self, target: ScanTarget) -> EngineResult<()>;

    /// End whatever scan is active. No-op if none.
    fn end_scan(&mut self);

    fn position_first(&mut self) -> EngineResult<Fetch>;

    fn position_last(&mut self) -> EngineResult<Fetch>;

    fn position_next(&mut self) -> EngineResult<Fetch>;

    fn position_prev(&mut self) -> EngineResult<Fetch>;

    /// Advance while the current index key still starts with `key`
    fn position_next_same_prefix(&mut self, key: &[KeyPart]) -> EngineResult<Fetch>;

    fn position_by_key(&mut self, key: &[KeyPart], comparator: KeyComparator)
        -> EngineResult<Fetch>;
}
