//! Direct table handles
//!
//! A session opens a table under an alias, keeps the cursor across
//! statements, and steps through it with positional reads until it closes
//! the handle or an administrative event invalidates it.
//!
//! - [`HandleManager`]: open, read, close, bulk removal, flush, cleanup
//! - [`HandleCache`] / [`HandleEntry`]: per-session handle state
//! - [`ScanEngine`]: which cursor primitive runs next
//! - [`RowBatch`]: lazy rows of one read
//! - [`LockScope`]: the lock context swap around opens and reads

mod batch;
mod cache;
mod entry;
mod errors;
mod filter;
mod lock_scope;
mod manager;
mod name;
mod scan;

pub use batch::RowBatch;
pub use cache::HandleCache;
pub use entry::{HandleEntry, ScanMode};
pub use errors::{HandlerError, HandlerErrorCode, HandlerResult};
pub use filter::{Condition, FilterOp, RowFilter, RowPredicate};
pub use lock_scope::LockScope;
pub use manager::{HandleManager, ReadRequest};
pub use name::{alias_key, HandleName, TableRef, SYSTEM_SCHEMA};
pub use scan::{ReadOp, ScanEngine};
