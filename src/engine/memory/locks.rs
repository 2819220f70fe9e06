//! Per-session lock context backed by the shared catalog

use std::mem;

use crate::engine::errors::LockError;
use crate::engine::lock::{LockBackup, LockContext, LockRequest, LockTicket};

use super::catalog::MemoryCatalog;

/// One session's lock set
#[derive(Debug)]
pub struct MemoryLocks {
    catalog: MemoryCatalog,
    held: Vec<LockTicket>,
    locked_tables: bool,
}

impl MemoryLocks {
    pub fn new(catalog: MemoryCatalog) -> Self {
        Self {
            catalog,
            held: Vec::new(),
            locked_tables: false,
        }
    }

    /// Enter or leave explicit locked-tables mode
    pub fn set_locked_tables(&mut self, locked: bool) {
        self.locked_tables = locked;
    }

    /// Tickets in the currently installed lock set
    pub fn held(&self) -> &[LockTicket] {
        &self.held
    }
}

impl LockContext for MemoryLocks {
    fn in_locked_tables_mode(&self) -> bool {
        self.locked_tables
    }

    fn backup_and_reset(&mut self) -> LockBackup {
        LockBackup {
            tickets: mem::take(&mut self.held),
        }
    }

    fn restore(&mut self, backup: LockBackup) {
        debug_assert!(self.held.is_empty(), "lock scope restored with tickets still held");
        self.held = backup.tickets;
    }

    fn acquire(&mut self, request: &LockRequest) -> Result<LockTicket, LockError> {
        let mut state = self.catalog.state();

        if state.exclusive_holders.contains(&request.table) {
            return Err(LockError::Timeout(request.table.to_string()));
        }

        if let Some(opened) = request.opened_version {
            let current = state.tables.get(&request.table).map(|t| t.version);
            if current != Some(opened) {
                return Err(LockError::NeedsReopen(request.table.to_string()));
            }
        }

        state.next_ticket += 1;
        let ticket = LockTicket::new(state.next_ticket, request.table.clone(), request.kind);
        state.granted.insert(ticket.id(), request.table.clone());
        self.held.push(ticket.clone());
        Ok(ticket)
    }

    fn release(&mut self, ticket: LockTicket) {
        self.held.retain(|t| t.id() != ticket.id());
        self.catalog.state().granted.remove(&ticket.id());
    }

    fn take_acquired(&mut self) -> Vec<LockTicket> {
        mem::take(&mut self.held)
    }

    fn has_pending_conflict(&self, ticket: &LockTicket) -> bool {
        self.catalog.state().pending_exclusive.contains(ticket.table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::MemoryTable;
    use crate::engine::table::TableKey;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::with_tables([MemoryTable::new("test", "t1", &["id"])])
    }

    #[test]
    fn test_backup_and_restore() {
        let catalog = catalog();
        let mut locks = MemoryLocks::new(catalog.clone());
        locks
            .acquire(&LockRequest::metadata(TableKey::new("test", "t1")))
            .unwrap();
        assert_eq!(locks.held().len(), 1);

        let backup = locks.backup_and_reset();
        assert!(locks.held().is_empty());
        locks.restore(backup);
        assert_eq!(locks.held().len(), 1);
    }

    #[test]
    fn test_stale_version_needs_reopen() {
        let catalog = catalog();
        let mut locks = MemoryLocks::new(catalog.clone());
        catalog.alter_table("test", "t1");

        let err = locks
            .acquire(&LockRequest::read(TableKey::new("test", "t1"), 1))
            .unwrap_err();
        assert_eq!(err, LockError::NeedsReopen("test.t1".into()));
        assert_eq!(catalog.outstanding_locks(), 0);
    }

    #[test]
    fn test_exclusive_holder_times_out() {
        let catalog = catalog();
        let mut locks = MemoryLocks::new(catalog.clone());
        catalog.hold_exclusive("test", "t1");

        let err = locks
            .acquire(&LockRequest::metadata(TableKey::new("test", "t1")))
            .unwrap_err();
        assert!(matches!(err, LockError::Timeout(_)));
    }

    #[test]
    fn test_release_untracked_ticket() {
        let catalog = catalog();
        let mut locks = MemoryLocks::new(catalog.clone());
        let ticket = locks
            .acquire(&LockRequest::metadata(TableKey::new("test", "t1")))
            .unwrap();
        let detached = locks.take_acquired();
        assert_eq!(detached, vec![ticket.clone()]);
        assert_eq!(catalog.outstanding_locks(), 1);

        locks.release(ticket);
        assert_eq!(catalog.outstanding_locks(), 0);
    }

    #[test]
    fn test_pending_conflict() {
        let catalog = catalog();
        let mut locks = MemoryLocks::new(catalog.clone());
        let ticket = locks
            .acquire(&LockRequest::metadata(TableKey::new("test", "t1")))
            .unwrap();
        assert!(!locks.has_pending_conflict(&ticket));
        catalog.request_exclusive("test", "t1");
        assert!(locks.has_pending_conflict(&ticket));
    }
}
