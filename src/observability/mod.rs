//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Deferred responses and the HTTP binding produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every transition and rejection is a structured event keyed by response_id
//! - Metrics are cheap (atomic increments) and safe to record on any thread

pub mod logging;
pub mod metrics;
