//! Storage engine collaborators
//!
//! The handler subsystem never touches records, locks or the table cache
//! directly. It goes through three contracts:
//!
//! - [`EngineCursor`]: positioning primitives on one opened table
//! - [`LockContext`]: the session's lock set, with backup/restore
//! - [`TableOpener`]: generic open-and-lock of a named table
//!
//! [`memory`] implements all three in memory.

mod cursor;
mod errors;
mod lock;
mod opener;
mod table;

pub mod key;
pub mod memory;

pub use cursor::{EngineCursor, Fetch, ScanTarget};
pub use errors::{EngineError, EngineResult, LockError, ERR_NO_SUCH_TABLE};
pub use key::{key_from_json, KeyComparator, KeyPart, KeyTuple};
pub use lock::{LockBackup, LockContext, LockKind, LockRequest, LockTicket};
pub use opener::TableOpener;
pub use table::{IndexDescriptor, KeyIndex, Row, TableDescriptor, TableKey};
