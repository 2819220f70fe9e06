//! Generic open-and-lock collaborator

use super::cursor::EngineCursor;
use super::errors::EngineResult;
use super::lock::LockContext;
use crate::handler::HandleName;

/// Resolves a handle name to engine cursors and takes them back on close.
pub trait TableOpener {
    type Cursor: EngineCursor;

    /// Open and lock the physical object(s) behind `name`.
    ///
    /// Locks are taken through `locks`, which is the currently installed
    /// lock scope. A merge/partitioned object yields more than one cursor.
    fn open_and_lock<L: LockContext>(
        &mut self,
        name: &HandleName,
        locks: &mut L,
    ) -> EngineResult<Vec<Self::Cursor>>;

    /// Return a cursor to the table cache.
    ///
    /// Returns true if the table had an old version and waiters were told
    /// to refresh.
    fn close_table(&mut self, cursor: Self::Cursor) -> bool;

    /// True while the caller holds the global table-definition lock
    fn holds_definition_lock(&self) -> bool {
        false
    }
}
