//! Observability for the handler subsystem
//!
//! - Structured logging (JSON lines on stderr)
//! - Monotonic counters
//! - Typed lifecycle events
//!
//! Observability is read-only: nothing here changes handler behaviour, and a
//! failed log write is dropped silently.
//!
//! ```ignore
//! use aerohandler::observability::{log_event, HandlerEvent, HandlerMetrics};
//!
//! log_event(HandlerEvent::HandleOpen, &[("alias", "h1")]);
//!
//! let metrics = HandlerMetrics::new();
//! metrics.increment_opened();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::HandlerEvent;
pub use logger::{Logger, Severity};
pub use metrics::{HandlerMetrics, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event at its own severity
pub fn log_event(event: HandlerEvent, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
