//! Handler error types
//!
//! Error codes:
//! - AERO_HANDLER_DUPLICATE_ALIAS
//! - AERO_HANDLER_UNKNOWN_HANDLE
//! - AERO_HANDLER_MULTI_TABLE_OPEN
//! - AERO_HANDLER_ENGINE_UNSUPPORTED
//! - AERO_HANDLER_TOO_MANY_KEY_PARTS
//! - AERO_HANDLER_ILLEGAL_OPERATION
//! - AERO_HANDLER_UNKNOWN_KEY
//! - AERO_HANDLER_WRONG_USAGE
//! - AERO_HANDLER_LOCKED_TABLES
//! - AERO_HANDLER_OPEN_FAILED
//! - AERO_HANDLER_ENGINE_ERROR
//! - AERO_HANDLER_LOCK_TIMEOUT
//! - AERO_HANDLER_LOCK_CONFLICT
//! - AERO_HANDLER_TOO_MANY_REOPEN_ATTEMPTS
//!
//! All handler errors are ERROR severity: they fail one statement and leave
//! the session usable.

use std::fmt;

use crate::engine::{EngineError, LockError, ERR_NO_SUCH_TABLE};

/// Handler error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerErrorCode {
    /// Alias already open in this session
    DuplicateAlias,
    /// No handle with this alias
    UnknownHandle,
    /// Name resolved to more than one physical table
    MultiTableOpen,
    /// Engine does not allow direct positional access
    EngineUnsupported,
    /// Key seek supplied more values than the index has parts
    TooManyKeyParts,
    /// Operation not valid in the current state
    IllegalOperation,
    /// Index name not defined on the table
    UnknownKey,
    /// Statement not allowed on this object
    WrongUsage,
    /// Session holds an explicit lock set
    LockedTables,
    /// Generic open path failed
    OpenFailed,
    /// Opaque storage engine failure
    EngineError,
    /// Lock wait timed out
    LockTimeout,
    /// Lock request conflicted
    LockConflict,
    /// Read gave up re-opening a repeatedly invalidated handle
    TooManyReopenAttempts,
}

impl HandlerErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            HandlerErrorCode::DuplicateAlias => "AERO_HANDLER_DUPLICATE_ALIAS",
            HandlerErrorCode::UnknownHandle => "AERO_HANDLER_UNKNOWN_HANDLE",
            HandlerErrorCode::MultiTableOpen => "AERO_HANDLER_MULTI_TABLE_OPEN",
            HandlerErrorCode::EngineUnsupported => "AERO_HANDLER_ENGINE_UNSUPPORTED",
            HandlerErrorCode::TooManyKeyParts => "AERO_HANDLER_TOO_MANY_KEY_PARTS",
            HandlerErrorCode::IllegalOperation => "AERO_HANDLER_ILLEGAL_OPERATION",
            HandlerErrorCode::UnknownKey => "AERO_HANDLER_UNKNOWN_KEY",
            HandlerErrorCode::WrongUsage => "AERO_HANDLER_WRONG_USAGE",
            HandlerErrorCode::LockedTables => "AERO_HANDLER_LOCKED_TABLES",
            HandlerErrorCode::OpenFailed => "AERO_HANDLER_OPEN_FAILED",
            HandlerErrorCode::EngineError => "AERO_HANDLER_ENGINE_ERROR",
            HandlerErrorCode::LockTimeout => "AERO_HANDLER_LOCK_TIMEOUT",
            HandlerErrorCode::LockConflict => "AERO_HANDLER_LOCK_CONFLICT",
            HandlerErrorCode::TooManyReopenAttempts => "AERO_HANDLER_TOO_MANY_REOPEN_ATTEMPTS",
        }
    }
}

impl fmt::Display for HandlerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Handler error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    code: HandlerErrorCode,
    message: String,
    /// Engine error number for `EngineError`
    engine_code: Option<i32>,
}

impl HandlerError {
    fn new(code: HandlerErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            engine_code: None,
        }
    }

    pub fn duplicate_alias(alias: &str) -> Self {
        Self::new(
            HandlerErrorCode::DuplicateAlias,
            format!("Not unique table/alias: '{}'", alias),
        )
    }

    pub fn unknown_handle(alias: &str) -> Self {
        Self::new(
            HandlerErrorCode::UnknownHandle,
            format!("Unknown table '{}' in HANDLER", alias),
        )
    }

    pub fn multi_table_open(table: &str, objects: usize) -> Self {
        Self::new(
            HandlerErrorCode::MultiTableOpen,
            format!("'{}' opened {} physical tables, expected one", table, objects),
        )
    }

    pub fn engine_unsupported(table: &str) -> Self {
        Self::new(
            HandlerErrorCode::EngineUnsupported,
            format!("The storage engine for '{}' doesn't have this option", table),
        )
    }

    pub fn too_many_key_parts(given: usize, max: usize) -> Self {
        Self::new(
            HandlerErrorCode::TooManyKeyParts,
            format!("Too many key parts specified; max {} parts allowed, got {}", max, given),
        )
    }

    pub fn illegal_operation(reason: impl Into<String>) -> Self {
        Self::new(HandlerErrorCode::IllegalOperation, reason)
    }

    pub fn unknown_key(key: &str, table: &str) -> Self {
        Self::new(
            HandlerErrorCode::UnknownKey,
            format!("Key '{}' doesn't exist in table '{}'", key, table),
        )
    }

    pub fn wrong_usage(reason: impl Into<String>) -> Self {
        Self::new(HandlerErrorCode::WrongUsage, reason)
    }

    pub fn locked_tables() -> Self {
        Self::new(
            HandlerErrorCode::LockedTables,
            "Can't execute the given command because you have active locked tables",
        )
    }

    pub fn open_failed(reason: impl Into<String>) -> Self {
        Self::new(HandlerErrorCode::OpenFailed, reason)
    }

    pub fn engine(code: i32, message: impl Into<String>) -> Self {
        Self {
            code: HandlerErrorCode::EngineError,
            message: message.into(),
            engine_code: Some(code),
        }
    }

    pub fn too_many_reopen_attempts(alias: &str, attempts: u32) -> Self {
        Self::new(
            HandlerErrorCode::TooManyReopenAttempts,
            format!("Handle '{}' invalidated {} times during one read", alias, attempts),
        )
    }

    pub fn code(&self) -> HandlerErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Engine error number, if the engine reported one
    pub fn engine_code(&self) -> Option<i32> {
        self.engine_code
    }

    /// Convert a failure raised while opening a table. A missing table is an
    /// open failure here; anywhere else it is an engine error.
    pub(crate) fn from_open(err: EngineError) -> Self {
        match err {
            EngineError::NoSuchTable(_) => Self::open_failed(err.to_string()),
            other => other.into(),
        }
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR] {}: {}", self.code.code(), self.message)?;
        if let Some(code) = self.engine_code {
            write!(f, " (engine error {})", code)?;
        }
        Ok(())
    }
}

impl std::error::Error for HandlerError {}

impl From<LockError> for HandlerError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout(_) => Self::new(HandlerErrorCode::LockTimeout, err.to_string()),
            LockError::Conflict(_) => Self::new(HandlerErrorCode::LockConflict, err.to_string()),
            // Only reachable when an open path surfaces it; reads retry instead
            LockError::NeedsReopen(_) => Self::new(HandlerErrorCode::OpenFailed, err.to_string()),
        }
    }
}

impl From<EngineError> for HandlerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NoSuchTable(_) => Self::engine(ERR_NO_SUCH_TABLE, err.to_string()),
            EngineError::Engine { code, message } => Self::engine(code, message),
            EngineError::Lock(lock) => lock.into(),
        }
    }
}

/// Result type for handler operations
pub type HandlerResult<T> = Result<T, HandlerError>;
