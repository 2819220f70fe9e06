//! One cached handle

use crate::engine::{EngineCursor, KeyIndex, KeyTuple, LockTicket};

use super::name::HandleName;

/// Continuation state: which primitive the next step of a scan issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    /// Nothing positioned since the cursor opened
    #[default]
    Uninitialized,
    /// Continue with position-next
    Forward,
    /// Continue with position-prev
    Backward,
    /// Continue with position-next while the seek key prefix still matches
    ForwardSamePrefix,
}

impl ScanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::Uninitialized => "uninitialized",
            ScanMode::Forward => "forward",
            ScanMode::Backward => "backward",
            ScanMode::ForwardSamePrefix => "forward_same_prefix",
        }
    }
}

/// A named, possibly open, engine cursor and its scan state.
///
/// `cursor` is `Some` only between a successful open and the next close.
/// Closing resets the scan mode, the active index and the last seek key.
#[derive(Debug)]
pub struct HandleEntry<C> {
    name: HandleName,
    pub(crate) cursor: Option<C>,
    pub(crate) scan_mode: ScanMode,
    pub(crate) active_key_index: Option<KeyIndex>,
    pub(crate) last_key: Option<KeyTuple>,
    pub(crate) lock_ticket: Option<LockTicket>,
    open_count: u32,
}

impl<C> HandleEntry<C> {
    pub(crate) fn new(name: HandleName) -> Self {
        Self {
            name,
            cursor: None,
            scan_mode: ScanMode::Uninitialized,
            active_key_index: None,
            last_key: None,
            lock_ticket: None,
            open_count: 0,
        }
    }

    pub fn name(&self) -> &HandleName {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn cursor(&self) -> Option<&C> {
        self.cursor.as_ref()
    }

    pub fn scan_mode(&self) -> ScanMode {
        self.scan_mode
    }

    pub fn active_key_index(&self) -> Option<KeyIndex> {
        self.active_key_index
    }

    pub fn last_key(&self) -> Option<&KeyTuple> {
        self.last_key.as_ref()
    }

    pub fn lock_ticket(&self) -> Option<&LockTicket> {
        self.lock_ticket.as_ref()
    }

    /// Successful opens, first open and re-opens alike
    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    /// Install a freshly opened cursor
    pub(crate) fn attach(&mut self, cursor: C, ticket: Option<LockTicket>) {
        debug_assert!(self.cursor.is_none(), "attach over an open cursor");
        self.cursor = Some(cursor);
        self.lock_ticket = ticket;
        self.scan_mode = ScanMode::Uninitialized;
        self.active_key_index = None;
        self.last_key = None;
        self.open_count += 1;
    }
}

impl<C: EngineCursor> HandleEntry<C> {
    /// End any scan and hand back the cursor and ticket.
    ///
    /// Returns None if the entry is already closed.
    pub(crate) fn detach(&mut self) -> Option<(C, Option<LockTicket>)> {
        let mut cursor = self.cursor.take()?;
        cursor.end_scan();
        self.scan_mode = ScanMode::Uninitialized;
        self.active_key_index = None;
        self.last_key = None;
        Some((cursor, self.lock_ticket.take()))
    }
}
