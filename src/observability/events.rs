//! Handler lifecycle events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events of the handler subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerEvent {
    // Open
    /// Handle opened for the first time
    HandleOpen,
    /// Closed handle transparently reopened
    HandleReopen,
    /// Open or reopen failed
    HandleOpenFailed,

    // Close
    /// Cursor closed (entry may survive)
    HandleClose,
    /// Cursor closed by a flush because of a conflict or stale definition
    HandleInvalidated,
    /// Entry evicted from the cache
    HandleRemoved,
    /// Closing a stale table told waiters to refresh
    HandleRefresh,

    // Read
    /// Read started
    HandleRead,
    /// Lock reported needs-reopen; read restarts
    HandleReadRetry,
    /// Read stopped on an engine error
    HandleReadFailed,

    // Session
    /// Flush scan over all handles
    Flush,
    /// All handles of a session closed
    SessionCleanup,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,
}

impl HandlerEvent {
    /// Returns the string representation of this event
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerEvent::HandleOpen => "HANDLE_OPEN",
            HandlerEvent::HandleReopen => "HANDLE_REOPEN",
            HandlerEvent::HandleOpenFailed => "HANDLE_OPEN_FAILED",
            HandlerEvent::HandleClose => "HANDLE_CLOSE",
            HandlerEvent::HandleInvalidated => "HANDLE_INVALIDATED",
            HandlerEvent::HandleRemoved => "HANDLE_REMOVED",
            HandlerEvent::HandleRefresh => "HANDLE_REFRESH",
            HandlerEvent::HandleRead => "HANDLE_READ",
            HandlerEvent::HandleReadRetry => "HANDLE_READ_RETRY",
            HandlerEvent::HandleReadFailed => "HANDLE_READ_FAILED",
            HandlerEvent::Flush => "FLUSH",
            HandlerEvent::SessionCleanup => "SESSION_CLEANUP",
            HandlerEvent::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    /// Severity this event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            HandlerEvent::HandleOpenFailed | HandlerEvent::HandleReadFailed => Severity::Error,
            HandlerEvent::HandleInvalidated | HandlerEvent::HandleReadRetry => Severity::Warn,
            HandlerEvent::HandleRead => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for HandlerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
