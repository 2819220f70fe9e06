//! aerohandler - direct table handles for a relational engine
//!
//! A session-scoped cache of open engine cursors, driven by positional
//! reads (first, next, prev, last, key seek) and invalidated by concurrent
//! flushes and schema changes.

pub mod cli;
pub mod config;
pub mod engine;
pub mod handler;
pub mod observability;
