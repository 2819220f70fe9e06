//! Positioning state machine
//!
//! Given a requested operation and a handle entry, decides which cursor
//! primitive to issue and which continuation mode follows.
//!
//! | mode       | op          | primitive                                   | next mode         |
//! |------------|-------------|---------------------------------------------|-------------------|
//! | any        | First       | end scan, init index or full, first         | Forward           |
//! | any        | Last        | end scan, init index, last                  | Backward          |
//! | scan open  | Next        | next                                        | Forward           |
//! | scan open  | Prev        | prev                                        | Backward          |
//! | index open | SamePrefix  | next with same key prefix                   | ForwardSamePrefix |
//! | any        | Seek        | end scan, init index, position by key       | per comparator    |
//!
//! Next and Prev without a matching open scan fall back to First and Last.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::{
    key_from_json, EngineCursor, Fetch, KeyComparator, KeyTuple, ScanTarget, TableDescriptor,
};

use super::entry::{HandleEntry, ScanMode};
use super::errors::{HandlerError, HandlerResult};

/// Operation requested by the query layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ReadOp {
    First,
    Next,
    Prev,
    Last,
    SamePrefix,
    /// Key seek on the request's index
    Seek {
        key: Vec<Value>,
        comparator: KeyComparator,
    },
}

impl ReadOp {
    pub fn seek(key: Vec<Value>, comparator: KeyComparator) -> Self {
        ReadOp::Seek { key, comparator }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadOp::First => "first",
            ReadOp::Next => "next",
            ReadOp::Prev => "prev",
            ReadOp::Last => "last",
            ReadOp::SamePrefix => "same_prefix",
            ReadOp::Seek { .. } => "seek",
        }
    }
}

/// A cursor primitive
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Primitive {
    First,
    Last,
    Next,
    Prev,
    NextSamePrefix,
    Seek(KeyTuple, KeyComparator),
}

/// A validated read: scan target plus the first primitive to issue
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScanPlan {
    pub(crate) target: ScanTarget,
    pub(crate) first: Primitive,
}

/// Stateless driver of the scan state machine
pub struct ScanEngine;

impl ScanEngine {
    /// Continuation mode after a key seek
    pub fn continuation(comparator: KeyComparator) -> ScanMode {
        match comparator {
            KeyComparator::Exact => ScanMode::ForwardSamePrefix,
            KeyComparator::GreaterOrEqual => ScanMode::Forward,
            KeyComparator::LessOrEqual => ScanMode::Backward,
            KeyComparator::StrictlyGreater => ScanMode::Forward,
            KeyComparator::StrictlyLess => ScanMode::Backward,
            KeyComparator::PrefixFirst => ScanMode::Forward,
            KeyComparator::PrefixLast => ScanMode::Backward,
            KeyComparator::PrefixLastOrLess => ScanMode::Backward,
        }
    }

    /// Validate a request against the table and the entry's scan state
    pub(crate) fn plan<C: EngineCursor>(
        entry: &HandleEntry<C>,
        index: Option<&str>,
        op: &ReadOp,
    ) -> HandlerResult<ScanPlan> {
        let cursor = entry
            .cursor
            .as_ref()
            .ok_or_else(|| HandlerError::illegal_operation("handle is not open"))?;
        let descriptor = cursor.descriptor();
        let target = Self::resolve_target(descriptor, index)?;

        let requires_index = !matches!(op, ReadOp::First | ReadOp::Next);
        if requires_index && target == ScanTarget::Full {
            return Err(HandlerError::illegal_operation(format!(
                "'{}' needs an index",
                op.as_str()
            )));
        }

        let scan_matches = cursor.active_scan() == Some(target);
        let first = match op {
            ReadOp::First => Primitive::First,
            ReadOp::Last => Primitive::Last,
            ReadOp::Next if scan_matches => Primitive::Next,
            ReadOp::Next => Primitive::First,
            ReadOp::Prev if scan_matches => Primitive::Prev,
            ReadOp::Prev => Primitive::Last,
            ReadOp::SamePrefix => {
                if !scan_matches || entry.last_key.is_none() {
                    return Err(HandlerError::illegal_operation(
                        "'same_prefix' needs a previous key seek on this index",
                    ));
                }
                Primitive::NextSamePrefix
            }
            ReadOp::Seek { key, comparator } => {
                let parts = match target
                    .key_index()
                    .and_then(|idx| descriptor.index(idx))
                {
                    Some(idx) => idx.key_parts(),
                    None => 0,
                };
                Primitive::Seek(Self::seek_key(key, parts)?, *comparator)
            }
        };

        Ok(ScanPlan { target, first })
    }

    fn resolve_target(descriptor: &TableDescriptor, index: Option<&str>) -> HandlerResult<ScanTarget> {
        match index {
            None => Ok(ScanTarget::Full),
            Some(name) => descriptor
                .find_index(name)
                .map(ScanTarget::Index)
                .ok_or_else(|| HandlerError::unknown_key(name, &descriptor.table)),
        }
    }

    fn seek_key(values: &[Value], max_parts: usize) -> HandlerResult<KeyTuple> {
        if values.is_empty() {
            return Err(HandlerError::illegal_operation("key seek needs at least one value"));
        }
        if values.len() > max_parts {
            return Err(HandlerError::too_many_key_parts(values.len(), max_parts));
        }
        key_from_json(values)
            .ok_or_else(|| HandlerError::illegal_operation("wrong arguments: key values must be scalar"))
    }

    /// Primitive that continues the scan in the entry's current mode
    pub(crate) fn next_primitive<C>(entry: &HandleEntry<C>) -> Primitive {
        match entry.scan_mode {
            ScanMode::Forward => Primitive::Next,
            ScanMode::Backward => Primitive::Prev,
            ScanMode::ForwardSamePrefix if entry.last_key.is_some() => Primitive::NextSamePrefix,
            ScanMode::ForwardSamePrefix => Primitive::Next,
            ScanMode::Uninitialized => Primitive::First,
        }
    }

    /// Issue one primitive, updating mode, active index and seek key.
    ///
    /// The continuation mode is set before the primitive runs, so a fetch
    /// that lands on a deleted record continues in the new mode.
    pub(crate) fn step<C: EngineCursor>(
        entry: &mut HandleEntry<C>,
        target: ScanTarget,
        primitive: &Primitive,
    ) -> HandlerResult<Fetch> {
        let cursor = entry
            .cursor
            .as_mut()
            .ok_or_else(|| HandlerError::illegal_operation("handle is not open"))?;

        let fetch = match primitive {
            Primitive::First => {
                cursor.end_scan();
                entry.active_key_index = None;
                cursor.init_scan(target)?;
                entry.active_key_index = target.key_index();
                entry.last_key = None;
                entry.scan_mode = ScanMode::Forward;
                cursor.position_first()
            }
            Primitive::Last => {
                cursor.end_scan();
                entry.active_key_index = None;
                cursor.init_scan(target)?;
                entry.active_key_index = target.key_index();
                entry.last_key = None;
                entry.scan_mode = ScanMode::Backward;
                cursor.position_last()
            }
            Primitive::Next => {
                entry.scan_mode = ScanMode::Forward;
                cursor.position_next()
            }
            Primitive::Prev => {
                entry.scan_mode = ScanMode::Backward;
                cursor.position_prev()
            }
            Primitive::NextSamePrefix => {
                entry.scan_mode = ScanMode::ForwardSamePrefix;
                match entry.last_key.as_deref() {
                    Some(key) => cursor.position_next_same_prefix(key),
                    None => cursor.position_next(),
                }
            }
            Primitive::Seek(key, comparator) => {
                cursor.end_scan();
                entry.active_key_index = None;
                cursor.init_scan(target)?;
                entry.active_key_index = target.key_index();
                entry.last_key = Some(key.clone());
                entry.scan_mode = Self::continuation(*comparator);
                cursor.position_by_key(key, *comparator)
            }
        };

        Ok(fetch?)
    }
}
