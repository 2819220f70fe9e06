//! Lock context contract
//!
//! A lock context is the session's set of held table locks. It can be backed
//! up and reset to an empty scope, so a handle can take locks that never mix
//! with the session's ambient ones, and later restored.

use std::fmt;

use super::errors::LockError;
use super::table::TableKey;

/// Kind of table lock requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKind {
    /// Shared metadata lock held for the lifetime of an open handle
    SharedMetadata,
    /// Statement-duration read lock
    Read,
}

impl LockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockKind::SharedMetadata => "shared_metadata",
            LockKind::Read => "read",
        }
    }
}

/// A granted lock. Owned by exactly one holder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockTicket {
    id: u64,
    table: TableKey,
    kind: LockKind,
}

impl LockTicket {
    pub fn new(id: u64, table: TableKey, kind: LockKind) -> Self {
        Self { id, table, kind }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn table(&self) -> &TableKey {
        &self.table
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }
}

impl fmt::Display for LockTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.kind.as_str(), self.id, self.table)
    }
}

/// A lock request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRequest {
    pub table: TableKey,
    pub kind: LockKind,
    /// Table version the requester has open; a mismatch means needs-reopen
    pub opened_version: Option<u64>,
}

impl LockRequest {
    /// Metadata lock taken while opening a table
    pub fn metadata(table: TableKey) -> Self {
        Self {
            table,
            kind: LockKind::SharedMetadata,
            opened_version: None,
        }
    }

    /// Statement read lock for an already opened table version
    pub fn read(table: TableKey, opened_version: u64) -> Self {
        Self {
            table,
            kind: LockKind::Read,
            opened_version: Some(opened_version),
        }
    }
}

/// The ambient lock set saved by [`LockContext::backup_and_reset`]
#[derive(Debug, Default)]
pub struct LockBackup {
    pub tickets: Vec<LockTicket>,
}

/// Session lock context
pub trait LockContext {
    /// True while the session holds an explicit multi-statement lock set
    fn in_locked_tables_mode(&self) -> bool;

    /// Detach the current lock set and install an empty one
    fn backup_and_reset(&mut self) -> LockBackup;

    /// Reinstate a lock set detached by `backup_and_reset`
    fn restore(&mut self, backup: LockBackup);

    /// Acquire a lock into the current lock set. May block.
    fn acquire(&mut self, request: &LockRequest) -> Result<LockTicket, LockError>;

    /// Release a ticket, whether or not it is in the current lock set
    fn release(&mut self, ticket: LockTicket);

    /// Drain every ticket in the current lock set without releasing them
    fn take_acquired(&mut self) -> Vec<LockTicket>;

    /// True if another session is waiting for a lock conflicting with `ticket`
    fn has_pending_conflict(&self, ticket: &LockTicket) -> bool;
}
