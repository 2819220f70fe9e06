//! Lazy row sequence produced by one read
//!
//! A batch drives the scan one primitive at a time as it is iterated:
//! - deleted records are skipped without counting
//! - end of scan and key-not-found end the batch cleanly
//! - any other engine error is yielded once and ends the batch
//!
//! Rows already yielded are never retracted. The statement lock taken for
//! the read is released when the batch is dropped.

use std::sync::Arc;

use crate::engine::{EngineCursor, Fetch, LockContext, LockTicket, Row, ScanTarget};
use crate::observability::{log_event, HandlerEvent, HandlerMetrics};

use super::entry::HandleEntry;
use super::errors::{HandlerError, HandlerResult};
use super::filter::RowPredicate;
use super::scan::{Primitive, ScanEngine, ScanPlan};

pub struct RowBatch<'a, C: EngineCursor, L: LockContext> {
    entry: &'a mut HandleEntry<C>,
    locks: &'a mut L,
    target: ScanTarget,
    pending: Option<Primitive>,
    filter: Option<Box<dyn RowPredicate>>,
    offset: u64,
    limit: u64,
    skipped: u64,
    emitted: u64,
    done: bool,
    tickets: Vec<LockTicket>,
    metrics: Arc<HandlerMetrics>,
}

impl<'a, C: EngineCursor, L: LockContext> RowBatch<'a, C, L> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entry: &'a mut HandleEntry<C>,
        locks: &'a mut L,
        plan: ScanPlan,
        filter: Option<Box<dyn RowPredicate>>,
        offset: u64,
        limit: u64,
        tickets: Vec<LockTicket>,
        metrics: Arc<HandlerMetrics>,
    ) -> Self {
        Self {
            entry,
            locks,
            target: plan.target,
            pending: Some(plan.first),
            filter,
            offset,
            limit,
            skipped: 0,
            emitted: 0,
            done: false,
            tickets,
            metrics,
        }
    }

    /// Column names of the table being read
    pub fn columns(&self) -> Vec<String> {
        self.entry
            .cursor()
            .map(|c| c.descriptor().columns.clone())
            .unwrap_or_default()
    }

    pub fn alias(&self) -> &str {
        self.entry.name().alias()
    }

    /// Rows yielded so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Drain the batch: every row produced plus the error that ended it, if any
    pub fn drain(mut self) -> (Vec<Row>, Option<HandlerError>) {
        let mut rows = Vec::new();
        for item in self.by_ref() {
            match item {
                Ok(row) => rows.push(row),
                Err(err) => return (rows, Some(err)),
            }
        }
        (rows, None)
    }

    fn fail(&mut self, err: HandlerError) -> Option<HandlerResult<Row>> {
        self.done = true;
        log_event(
            HandlerEvent::HandleReadFailed,
            &[("alias", self.entry.name().alias()), ("code", err.code().code())],
        );
        Some(Err(err))
    }
}

impl<C: EngineCursor, L: LockContext> Iterator for RowBatch<'_, C, L> {
    type Item = HandlerResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done || self.emitted >= self.limit {
                self.done = true;
                return None;
            }

            let primitive = self
                .pending
                .take()
                .unwrap_or_else(|| ScanEngine::next_primitive(self.entry));

            let fetch = match ScanEngine::step(self.entry, self.target, &primitive) {
                Ok(fetch) => fetch,
                Err(err) => return self.fail(err),
            };

            match fetch {
                Fetch::RecordDeleted => {
                    self.metrics.increment_deleted_skipped();
                }
                Fetch::EndOfScan | Fetch::KeyNotFound => {
                    self.done = true;
                    return None;
                }
                Fetch::Row(row) => {
                    if let Some(filter) = &self.filter {
                        if !filter.matches(&row) {
                            continue;
                        }
                    }
                    if self.skipped < self.offset {
                        self.skipped += 1;
                        continue;
                    }
                    self.emitted += 1;
                    self.metrics.increment_rows_returned();
                    return Some(Ok(row));
                }
            }
        }
    }
}

impl<C: EngineCursor, L: LockContext> Drop for RowBatch<'_, C, L> {
    fn drop(&mut self) {
        for ticket in self.tickets.drain(..) {
            self.locks.release(ticket);
        }
    }
}
