//! Scope-bound lock context swap
//!
//! Entering saves the session's ambient lock set and installs an empty one.
//! Locks taken inside the scope never mix with the ambient set.
//! `finish` hands the acquired tickets to the caller and restores the ambient
//! set; dropping the scope without finishing releases them and restores.

use crate::engine::{LockBackup, LockContext, LockTicket};

pub struct LockScope<'a, L: LockContext> {
    locks: &'a mut L,
    backup: Option<LockBackup>,
}

impl<'a, L: LockContext> LockScope<'a, L> {
    pub fn enter(locks: &'a mut L) -> Self {
        let backup = locks.backup_and_reset();
        Self {
            locks,
            backup: Some(backup),
        }
    }

    /// The empty lock context installed for this scope
    pub fn context(&mut self) -> &mut L {
        self.locks
    }

    /// Detach the tickets acquired in this scope and restore the ambient set
    pub fn finish(mut self) -> Vec<LockTicket> {
        let tickets = self.locks.take_acquired();
        if let Some(backup) = self.backup.take() {
            self.locks.restore(backup);
        }
        tickets
    }
}

impl<L: LockContext> Drop for LockScope<'_, L> {
    fn drop(&mut self) {
        if let Some(backup) = self.backup.take() {
            for ticket in self.locks.take_acquired() {
                self.locks.release(ticket);
            }
            self.locks.restore(backup);
        }
    }
}
