//! Handle manager: the per-session composition root
//!
//! Owns the handle cache, the table opener and the session's lock context,
//! and sequences lock-context swaps around every open and read.
//!
//! Lock swap order is fixed: save ambient set, install empty set, acquire,
//! restore ambient set, keep the acquired ticket on the entry.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::HandlerConfig;
use crate::engine::{EngineCursor, LockContext, LockError, LockRequest, LockTicket, TableOpener};
use crate::observability::{log_event, HandlerEvent, HandlerMetrics, ObservationScope};

use super::batch::RowBatch;
use super::cache::HandleCache;
use super::entry::HandleEntry;
use super::errors::{HandlerError, HandlerResult};
use super::filter::RowPredicate;
use super::lock_scope::LockScope;
use super::name::{alias_key, HandleName, TableRef};
use super::scan::{ReadOp, ScanEngine};

/// One read statement
pub struct ReadRequest {
    pub alias: String,
    /// Index to scan; None for a full table scan
    pub index: Option<String>,
    pub op: ReadOp,
    pub filter: Option<Box<dyn RowPredicate>>,
    /// None means the configured default
    pub limit: Option<u64>,
    pub offset: u64,
}

impl ReadRequest {
    pub fn new(alias: impl Into<String>, op: ReadOp) -> Self {
        Self {
            alias: alias.into(),
            index: None,
            op,
            filter: None,
            limit: None,
            offset: 0,
        }
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn filter<P: RowPredicate + 'static>(mut self, predicate: P) -> Self {
        self.filter = Some(Box::new(predicate));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }
}

impl fmt::Debug for ReadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadRequest")
            .field("alias", &self.alias)
            .field("index", &self.index)
            .field("op", &self.op)
            .field("filtered", &self.filter.is_some())
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

pub struct HandleManager<O, L>
where
    O: TableOpener,
    L: LockContext,
{
    session_id: Uuid,
    cache: HandleCache<O::Cursor>,
    opener: O,
    locks: L,
    config: HandlerConfig,
    metrics: Arc<HandlerMetrics>,
}

impl<O, L> HandleManager<O, L>
where
    O: TableOpener,
    L: LockContext,
{
    pub fn new(opener: O, locks: L, config: HandlerConfig) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            cache: HandleCache::with_capacity(config.initial_capacity),
            opener,
            locks,
            config,
            metrics: Arc::new(HandlerMetrics::new()),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn metrics(&self) -> &Arc<HandlerMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn entry(&self, alias: &str) -> Option<&HandleEntry<O::Cursor>> {
        self.cache.get(alias)
    }

    /// Cached aliases, sorted
    pub fn aliases(&self) -> Vec<String> {
        self.cache.aliases()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn locks(&self) -> &L {
        &self.locks
    }

    pub fn locks_mut(&mut self) -> &mut L {
        &mut self.locks
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }

    /// Open a handle, or re-open a closed one.
    ///
    /// A failed first open leaves no entry; a failed re-open leaves the
    /// entry closed.
    pub fn open(&mut self, name: HandleName, reopen: bool) -> HandlerResult<()> {
        if self.locks.in_locked_tables_mode() {
            return Err(HandlerError::locked_tables());
        }
        if name.is_system_schema() {
            return Err(HandlerError::wrong_usage(format!(
                "HANDLER OPEN is not allowed on '{}'",
                name
            )));
        }

        let name = if reopen {
            let entry = self
                .cache
                .get(name.alias())
                .ok_or_else(|| HandlerError::unknown_handle(name.alias()))?;
            if entry.is_open() {
                return Err(HandlerError::illegal_operation(format!(
                    "handle '{}' is already open",
                    name.alias()
                )));
            }
            entry.name().clone()
        } else {
            if self.cache.contains(name.alias()) {
                return Err(HandlerError::duplicate_alias(name.alias()));
            }
            name
        };

        let (cursor, ticket) = match open_cursor(&mut self.opener, &mut self.locks, &name) {
            Ok(opened) => opened,
            Err(err) => {
                self.metrics.increment_open_failures();
                log_event(
                    HandlerEvent::HandleOpenFailed,
                    &[
                        ("alias", name.alias()),
                        ("code", err.code().code()),
                        ("table", &name.to_string()),
                    ],
                );
                return Err(err);
            }
        };

        let entry = if reopen {
            self.cache
                .lookup(name.alias())
                .ok_or_else(|| HandlerError::unknown_handle(name.alias()))?
        } else {
            self.cache.insert(name.clone())?
        };
        entry.attach(cursor, ticket);

        let event = if reopen {
            self.metrics.increment_reopened();
            HandlerEvent::HandleReopen
        } else {
            self.metrics.increment_opened();
            HandlerEvent::HandleOpen
        };
        log_event(
            event,
            &[
                ("alias", name.alias()),
                ("session", &self.session_id.to_string()),
                ("table", &name.to_string()),
            ],
        );
        Ok(())
    }

    /// Start a read. Closed handles are re-opened transparently; a handle
    /// that turns stale while its statement lock is taken is closed and the
    /// read restarts from the lookup.
    pub fn read(&mut self, request: ReadRequest) -> HandlerResult<RowBatch<'_, O::Cursor, L>> {
        if self.locks.in_locked_tables_mode() {
            return Err(HandlerError::locked_tables());
        }

        let key = alias_key(&request.alias);
        let mut attempts: u32 = 0;

        let tickets = loop {
            let closed_name = match self.cache.get(&key) {
                None => return Err(HandlerError::unknown_handle(&request.alias)),
                Some(entry) if !entry.is_open() => Some(entry.name().clone()),
                Some(_) => None,
            };
            if let Some(name) = closed_name {
                self.open(name, true)?;
            }

            let entry = self
                .cache
                .lookup(&key)
                .ok_or_else(|| HandlerError::unknown_handle(&request.alias))?;
            let lock_request = match entry.cursor() {
                Some(cursor) if cursor.is_temporary() => None,
                Some(cursor) => Some(LockRequest::read(entry.name().table_key(), cursor.version())),
                None => return Err(HandlerError::illegal_operation("handle is not open")),
            };
            let Some(lock_request) = lock_request else {
                break Vec::new();
            };

            let mut scope = LockScope::enter(&mut self.locks);
            match scope.context().acquire(&lock_request) {
                Ok(_) => break scope.finish(),
                Err(LockError::NeedsReopen(table)) => {
                    drop(scope);
                    close_entry(
                        &mut self.opener,
                        &mut self.locks,
                        entry,
                        &self.metrics,
                        HandlerEvent::HandleInvalidated,
                    );
                    if let Some(max) = self.config.max_reopen_attempts {
                        if attempts >= max {
                            return Err(HandlerError::too_many_reopen_attempts(
                                &request.alias,
                                attempts + 1,
                            ));
                        }
                    }
                    attempts += 1;
                    self.metrics.increment_reopen_retries();
                    log_event(
                        HandlerEvent::HandleReadRetry,
                        &[("alias", &request.alias), ("table", &table)],
                    );
                }
                Err(err) => return Err(err.into()),
            }
        };

        let entry = match self.cache.lookup(&key) {
            Some(entry) => entry,
            None => {
                release_all(&mut self.locks, tickets);
                return Err(HandlerError::unknown_handle(&request.alias));
            }
        };
        let plan = match ScanEngine::plan(entry, request.index.as_deref(), &request.op) {
            Ok(plan) => plan,
            Err(err) => {
                release_all(&mut self.locks, tickets);
                return Err(err);
            }
        };
        if let Some(cursor) = entry.cursor.as_mut() {
            cursor.mark_for_direct_access();
        }

        self.metrics.increment_reads();
        log_event(
            HandlerEvent::HandleRead,
            &[("alias", &request.alias), ("op", request.op.as_str())],
        );

        let limit = request.limit.unwrap_or(self.config.default_read_limit);
        Ok(RowBatch::new(
            entry,
            &mut self.locks,
            plan,
            request.filter,
            request.offset,
            limit,
            tickets,
            Arc::clone(&self.metrics),
        ))
    }

    /// Close a handle and forget it
    pub fn close(&mut self, alias: &str) -> HandlerResult<()> {
        if self.locks.in_locked_tables_mode() {
            return Err(HandlerError::locked_tables());
        }
        let entry = self
            .cache
            .lookup(alias)
            .ok_or_else(|| HandlerError::unknown_handle(alias))?;
        close_entry(
            &mut self.opener,
            &mut self.locks,
            entry,
            &self.metrics,
            HandlerEvent::HandleClose,
        );
        self.evict(alias);
        Ok(())
    }

    /// Close and forget every handle whose name matches. Returns how many.
    pub fn remove_matching<P>(&mut self, mut predicate: P) -> usize
    where
        P: FnMut(&HandleName) -> bool,
    {
        let aliases = self.cache.aliases_matching(|e| predicate(e.name()));
        for alias in &aliases {
            if let Some(entry) = self.cache.lookup(alias) {
                close_entry(
                    &mut self.opener,
                    &mut self.locks,
                    entry,
                    &self.metrics,
                    HandlerEvent::HandleClose,
                );
            }
            self.evict(alias);
        }
        aliases.len()
    }

    /// Close and forget every handle on one of `tables`, whatever its alias
    pub fn remove_tables(&mut self, tables: &[TableRef]) -> usize {
        self.remove_matching(|name| tables.iter().any(|t| t.matches(name)))
    }

    /// Close every open handle whose table has a pending conflicting lock or
    /// needs reopen. Entries stay cached. Returns how many were closed.
    ///
    /// Must not be called while holding the table-definition lock.
    pub fn flush_invalidate(&mut self) -> usize {
        debug_assert!(
            !self.opener.holds_definition_lock(),
            "flush_invalidate called under the table-definition lock"
        );
        let session = self.session_id.to_string();
        let scope =
            ObservationScope::with_fields(HandlerEvent::Flush.as_str(), &[("session", &session)]);

        let mut closed = 0;
        for entry in self.cache.iter_mut() {
            let stale = match entry.cursor() {
                None => false,
                Some(cursor) => {
                    cursor.needs_reopen()
                        || entry
                            .lock_ticket()
                            .map_or(false, |t| self.locks.has_pending_conflict(t))
                }
            };
            if stale {
                close_entry(
                    &mut self.opener,
                    &mut self.locks,
                    entry,
                    &self.metrics,
                    HandlerEvent::HandleInvalidated,
                );
                closed += 1;
            }
        }

        scope.complete_with_fields(&[("invalidated", &closed.to_string())]);
        closed
    }

    /// Close and forget every handle. Runs on drop as well.
    pub fn session_cleanup(&mut self) -> usize {
        if self.cache.is_empty() {
            return 0;
        }
        let session = self.session_id.to_string();
        let scope = ObservationScope::with_fields(
            HandlerEvent::SessionCleanup.as_str(),
            &[("session", &session)],
        );

        let mut removed = 0;
        for entry in self.cache.iter_mut() {
            close_entry(
                &mut self.opener,
                &mut self.locks,
                entry,
                &self.metrics,
                HandlerEvent::HandleClose,
            );
            self.metrics.increment_removed();
            removed += 1;
        }
        self.cache.clear();

        scope.complete_with_fields(&[("removed", &removed.to_string())]);
        removed
    }

    fn evict(&mut self, alias: &str) {
        if let Some(entry) = self.cache.remove(alias) {
            self.metrics.increment_removed();
            log_event(
                HandlerEvent::HandleRemoved,
                &[("alias", entry.name().alias()), ("table", &entry.name().to_string())],
            );
        }
    }
}

impl<O, L> Drop for HandleManager<O, L>
where
    O: TableOpener,
    L: LockContext,
{
    fn drop(&mut self) {
        self.session_cleanup();
    }
}

/// Open `name` under a fresh lock scope and check it is usable as a handle
fn open_cursor<O, L>(
    opener: &mut O,
    locks: &mut L,
    name: &HandleName,
) -> HandlerResult<(O::Cursor, Option<LockTicket>)>
where
    O: TableOpener,
    L: LockContext,
{
    let mut scope = LockScope::enter(locks);
    let mut cursors = opener
        .open_and_lock(name, scope.context())
        .map_err(HandlerError::from_open)?;

    if cursors.len() != 1 {
        let opened = cursors.len();
        for cursor in cursors {
            opener.close_table(cursor);
        }
        return Err(if opened == 0 {
            HandlerError::open_failed(format!("'{}' opened no table", name))
        } else {
            HandlerError::multi_table_open(name.table(), opened)
        });
    }
    let Some(mut cursor) = cursors.pop() else {
        return Err(HandlerError::open_failed(format!("'{}' opened no table", name)));
    };

    if !cursor.supports_direct_access() {
        opener.close_table(cursor);
        return Err(HandlerError::engine_unsupported(name.table()));
    }
    cursor.mark_for_direct_access();

    let mut tickets = scope.finish().into_iter();
    let ticket = tickets.next();
    // One table, one ticket
    for extra in tickets {
        locks.release(extra);
    }
    Ok((cursor, ticket))
}

/// Close an entry's cursor and release its ticket. No-op if already closed.
fn close_entry<O, L>(
    opener: &mut O,
    locks: &mut L,
    entry: &mut HandleEntry<O::Cursor>,
    metrics: &HandlerMetrics,
    event: HandlerEvent,
) -> bool
where
    O: TableOpener,
    L: LockContext,
{
    let Some((cursor, ticket)) = entry.detach() else {
        return false;
    };
    if let Some(ticket) = ticket {
        locks.release(ticket);
    }

    if opener.close_table(cursor) {
        metrics.increment_refresh_broadcasts();
        log_event(HandlerEvent::HandleRefresh, &[("table", &entry.name().to_string())]);
    }

    if event == HandlerEvent::HandleInvalidated {
        metrics.increment_invalidated();
    } else {
        metrics.increment_closed();
    }
    log_event(
        event,
        &[("alias", entry.name().alias()), ("table", &entry.name().to_string())],
    );
    true
}

fn release_all<L: LockContext>(locks: &mut L, tickets: Vec<LockTicket>) {
    for ticket in tickets {
        locks.release(ticket);
    }
}
