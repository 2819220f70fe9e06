//! Errors reported by storage-engine collaborators

use thiserror::Error;

/// Result type for engine primitives
pub type EngineResult<T> = Result<T, EngineError>;

/// Engine error number reported for a table that no longer exists
pub const ERR_NO_SUCH_TABLE: i32 = 1146;

/// Lock manager failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The table changed since the cursor was opened; reopen before locking
    #[error("table '{0}' was flushed or altered and needs reopen")]
    NeedsReopen(String),

    #[error("lock wait timeout exceeded on '{0}'")]
    Timeout(String),

    #[error("lock conflict on '{0}'")]
    Conflict(String),
}

/// Storage engine failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("table '{0}' doesn't exist")]
    NoSuchTable(String),

    /// Opaque engine failure carrying the engine's own error number
    #[error("engine error {code}: {message}")]
    Engine { code: i32, message: String },

    #[error(transparent)]
    Lock(#[from] LockError),
}

impl EngineError {
    /// Create an opaque engine error
    pub fn engine(code: i32, message: impl Into<String>) -> Self {
        EngineError::Engine {
            code,
            message: message.into(),
        }
    }

    /// Engine error number; lock failures have none
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            EngineError::NoSuchTable(_) => Some(ERR_NO_SUCH_TABLE),
            EngineError::Engine { code, .. } => Some(*code),
            EngineError::Lock(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_error_converts() {
        let err: EngineError = LockError::Timeout("test.t".into()).into();
        assert_eq!(err, EngineError::Lock(LockError::Timeout("test.t".into())));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_engine_code() {
        assert_eq!(EngineError::engine(126, "index corrupt").engine_code(), Some(126));
        assert_eq!(
            EngineError::NoSuchTable("t".into()).engine_code(),
            Some(ERR_NO_SUCH_TABLE)
        );
        assert_eq!(EngineError::Lock(LockError::Timeout("t".into())).engine_code(), None);
    }
}
