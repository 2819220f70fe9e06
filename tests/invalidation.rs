//! Invalidation Tests
//!
//! Tests for flush and removal invariants:
//! - flush_invalidate closes only stale or conflicting handles
//! - Invalidated entries stay cached and re-open on the next read
//! - Name-based removal ignores aliases
//! - Bounded retry when a handle keeps turning stale

use aerohandler::config::HandlerConfig;
use aerohandler::engine::memory::{MemoryCatalog, MemoryLocks, MemoryOpener, MemoryTable};
use aerohandler::engine::{LockBackup, LockContext, LockError, LockRequest, LockTicket, Row};
use aerohandler::handler::{
    HandleManager, HandleName, HandlerErrorCode, HandlerResult, ReadOp, ReadRequest, ScanMode,
    TableRef,
};
use serde_json::{json, Value};

type Manager = HandleManager<MemoryOpener, MemoryLocks>;

// =============================================================================
// Helper Functions
// =============================================================================

fn catalog() -> MemoryCatalog {
    let rows = || (1..=4).map(|i| json!({ "id": i }));
    MemoryCatalog::with_tables([
        MemoryTable::new("test", "t", &["id"])
            .with_index("PRIMARY", &["id"])
            .with_rows(rows()),
        MemoryTable::new("test", "u", &["id"])
            .with_index("PRIMARY", &["id"])
            .with_rows(rows()),
        MemoryTable::new("other", "t", &["id"]).with_rows(rows()),
        MemoryTable::new("test", "tmp", &["id"])
            .with_rows(rows())
            .temporary(),
    ])
}

fn manager(catalog: &MemoryCatalog) -> Manager {
    HandleManager::new(
        MemoryOpener::new(catalog.clone()),
        MemoryLocks::new(catalog.clone()),
        HandlerConfig::default(),
    )
}

fn open(m: &mut Manager, schema: &str, table: &str, alias: &str) {
    m.open(HandleName::new(schema, table).with_alias(alias), false)
        .unwrap();
}

fn ids<L: LockContext>(m: &mut HandleManager<MemoryOpener, L>, request: ReadRequest) -> Vec<Value> {
    let rows: Vec<Row> = m
        .read(request)
        .unwrap()
        .collect::<HandlerResult<_>>()
        .unwrap();
    rows.iter()
        .map(|r| r.get("id").cloned().unwrap_or(Value::Null))
        .collect()
}

/// Lock context whose statement locks always report a stale table
struct AlwaysStale {
    inner: MemoryLocks,
}

impl LockContext for AlwaysStale {
    fn in_locked_tables_mode(&self) -> bool {
        self.inner.in_locked_tables_mode()
    }

    fn backup_and_reset(&mut self) -> LockBackup {
        self.inner.backup_and_reset()
    }

    fn restore(&mut self, backup: LockBackup) {
        self.inner.restore(backup)
    }

    fn acquire(&mut self, request: &LockRequest) -> Result<LockTicket, LockError> {
        if request.opened_version.is_some() {
            return Err(LockError::NeedsReopen(request.table.to_string()));
        }
        self.inner.acquire(request)
    }

    fn release(&mut self, ticket: LockTicket) {
        self.inner.release(ticket)
    }

    fn take_acquired(&mut self) -> Vec<LockTicket> {
        self.inner.take_acquired()
    }

    fn has_pending_conflict(&self, ticket: &LockTicket) -> bool {
        self.inner.has_pending_conflict(ticket)
    }
}

// =============================================================================
// Flush Tests
// =============================================================================

/// Only the altered table's handle is closed; the other keeps its position.
#[test]
fn test_flush_closes_only_stale_handles() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    open(&mut m, "test", "t", "ht");
    open(&mut m, "test", "u", "hu");

    ids(&mut m, ReadRequest::new("ht", ReadOp::First).index("PRIMARY"));
    assert_eq!(
        ids(&mut m, ReadRequest::new("hu", ReadOp::First).index("PRIMARY").limit(2)),
        vec![json!(1), json!(2)]
    );

    catalog.alter_table("test", "t");
    assert_eq!(m.flush_invalidate(), 1);

    let ht = m.entry("ht").unwrap();
    assert!(!ht.is_open());
    assert_eq!(ht.scan_mode(), ScanMode::Uninitialized);
    assert!(ht.active_key_index().is_none());
    assert!(ht.lock_ticket().is_none());

    let hu = m.entry("hu").unwrap();
    assert!(hu.is_open());
    assert_eq!(hu.scan_mode(), ScanMode::Forward);
    assert_eq!(
        ids(&mut m, ReadRequest::new("hu", ReadOp::Next).index("PRIMARY")),
        vec![json!(3)]
    );

    assert_eq!(m.len(), 2);
    assert_eq!(catalog.outstanding_locks_on("test", "t"), 0);
}

/// Closing a stale table broadcasts a refresh.
#[test]
fn test_flush_broadcasts_refresh() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    open(&mut m, "test", "t", "a");
    open(&mut m, "test", "u", "b");

    catalog.flush_tables();
    assert_eq!(m.flush_invalidate(), 2);
    assert_eq!(catalog.refresh_broadcasts(), 2);

    let snapshot = m.metrics().snapshot();
    assert_eq!(snapshot.handles_invalidated, 2);
    assert_eq!(snapshot.refresh_broadcasts, 2);
    assert_eq!(snapshot.handles_removed, 0);
}

/// A pending exclusive request closes handles on that table only.
#[test]
fn test_pending_exclusive_invalidates() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    open(&mut m, "test", "t", "a");
    open(&mut m, "test", "u", "b");

    catalog.request_exclusive("test", "t");
    assert_eq!(m.flush_invalidate(), 1);
    assert!(!m.entry("a").unwrap().is_open());
    assert!(m.entry("b").unwrap().is_open());
    // Not stale, so no refresh
    assert_eq!(catalog.refresh_broadcasts(), 0);

    catalog.withdraw_exclusive("test", "t");
    assert_eq!(m.flush_invalidate(), 0);
    assert_eq!(ids(&mut m, ReadRequest::new("a", ReadOp::First)), vec![json!(1)]);
    assert_eq!(m.entry("a").unwrap().open_count(), 2);
}

/// Temporary handles have no ticket and only react to needs-reopen.
#[test]
fn test_temporary_handle_flush() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    open(&mut m, "test", "tmp", "x");

    catalog.request_exclusive("test", "tmp");
    assert_eq!(m.flush_invalidate(), 0);
    assert!(m.entry("x").unwrap().is_open());

    catalog.alter_table("test", "tmp");
    assert_eq!(m.flush_invalidate(), 1);
    assert!(!m.entry("x").unwrap().is_open());
}

/// Flushing twice is harmless.
#[test]
fn test_flush_is_idempotent() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    open(&mut m, "test", "t", "a");

    catalog.flush_tables();
    assert_eq!(m.flush_invalidate(), 1);
    assert_eq!(m.flush_invalidate(), 0);
    assert_eq!(m.len(), 1);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "table-definition lock")]
fn test_flush_under_definition_lock_panics() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    catalog.set_definition_lock(true);
    m.flush_invalidate();
}

// =============================================================================
// Read Retry Tests
// =============================================================================

/// A table altered between reads is re-opened and the scan restarts.
#[test]
fn test_read_after_alter_restarts_scan() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    open(&mut m, "test", "t", "h");

    ids(&mut m, ReadRequest::new("h", ReadOp::First).index("PRIMARY").limit(2));
    catalog.alter_table("test", "t");

    assert_eq!(
        ids(&mut m, ReadRequest::new("h", ReadOp::Next).index("PRIMARY")),
        vec![json!(1)]
    );
    let snapshot = m.metrics().snapshot();
    assert_eq!(snapshot.reopen_retries, 1);
    assert_eq!(snapshot.handles_reopened, 1);
    assert_eq!(catalog.refresh_broadcasts(), 1);
    assert_eq!(catalog.outstanding_locks_on("test", "t"), 1);
}

/// The retry loop gives up after the configured number of re-opens.
#[test]
fn test_too_many_reopen_attempts() {
    let catalog = catalog();
    let config = HandlerConfig {
        max_reopen_attempts: Some(2),
        ..HandlerConfig::default()
    };
    let mut m = HandleManager::new(
        MemoryOpener::new(catalog.clone()),
        AlwaysStale {
            inner: MemoryLocks::new(catalog.clone()),
        },
        config,
    );
    m.open(HandleName::new("test", "t").with_alias("h"), false)
        .unwrap();

    let err = m
        .read(ReadRequest::new("h", ReadOp::First))
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.code(), HandlerErrorCode::TooManyReopenAttempts);

    let entry = m.entry("h").unwrap();
    assert!(!entry.is_open());
    assert_eq!(entry.open_count(), 3);
    assert_eq!(m.metrics().snapshot().reopen_retries, 2);
    assert_eq!(catalog.outstanding_locks(), 0);
}

/// An exclusive holder makes the statement lock time out; the handle survives.
#[test]
fn test_read_lock_timeout() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    open(&mut m, "test", "t", "h");

    catalog.hold_exclusive("test", "t");
    let err = m
        .read(ReadRequest::new("h", ReadOp::First))
        .map(|_| ())
        .unwrap_err();
    assert_eq!(err.code(), HandlerErrorCode::LockTimeout);
    assert!(m.entry("h").unwrap().is_open());
    assert!(m.locks().held().is_empty());

    catalog.release_exclusive("test", "t");
    assert_eq!(ids(&mut m, ReadRequest::new("h", ReadOp::First)), vec![json!(1)]);
}

// =============================================================================
// Removal Tests
// =============================================================================

/// Removal by schema and table closes every alias on it.
#[test]
fn test_remove_tables_by_name() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    open(&mut m, "test", "t", "a");
    open(&mut m, "test", "t", "b");
    open(&mut m, "test", "u", "c");
    open(&mut m, "other", "t", "d");

    assert_eq!(m.remove_tables(&[TableRef::new("TEST", "T")]), 2);
    assert_eq!(m.aliases(), vec!["c".to_string(), "d".to_string()]);
    assert!(m.entry("c").unwrap().is_open());
    assert_eq!(catalog.outstanding_locks_on("test", "t"), 0);
    assert_eq!(catalog.outstanding_locks_on("other", "t"), 1);
}

/// An empty schema matches the table in any schema.
#[test]
fn test_remove_tables_any_schema() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    open(&mut m, "test", "t", "a");
    open(&mut m, "other", "t", "b");
    open(&mut m, "test", "u", "c");

    assert_eq!(m.remove_tables(&[TableRef::any_schema("t")]), 2);
    assert_eq!(m.aliases(), vec!["c".to_string()]);
}

/// Closed entries are removed as well.
#[test]
fn test_remove_matching_includes_closed_entries() {
    let catalog = catalog();
    let mut m = manager(&catalog);
    open(&mut m, "test", "t", "a");
    open(&mut m, "test", "u", "b");

    catalog.alter_table("test", "t");
    m.flush_invalidate();

    assert_eq!(m.remove_matching(|name| name.table() == "t"), 1);
    assert!(m.entry("a").is_none());
    assert_eq!(m.remove_matching(|_| false), 0);
    assert_eq!(m.len(), 1);
}
