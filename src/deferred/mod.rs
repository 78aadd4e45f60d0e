//! Deferred completion subsystem.
//!
//! # Data Flow
//! ```text
//! Transport (request task):
//!     DeferredResponse::new → apply_policy / set_timeout → suspend
//!     → hand clone to background worker → wait() / on_resolved()
//!
//! Terminators (first wins, the rest are rejected):
//!     worker      → resume / resume_with_error  → Completed
//!     timer       → fire                        → TimedOut
//!     transport   → cancel                      → Cancelled
//!
//! Terminal transition:
//!     publish outcome → disarm timer → wake waiters → run listeners
//! ```
//!
//! # Design Decisions
//! - Concurrency control is per response; no global lock
//! - Rejections are returned to the caller, never swallowed
//! - Listener panics are isolated and reported to an ErrorSink

pub mod error;
pub mod listener;
pub mod outcome;
pub mod policy;
pub mod registry;
pub mod response;
pub mod state;

pub use error::{DeferredError, Operation};
pub use listener::{ErrorSink, Listener, TracingSink};
pub use outcome::{Failure, Outcome, TimeoutFailure};
pub use policy::{SuspendPolicy, TimeUnit};
pub use registry::ResponseRegistry;
pub use response::DeferredResponse;
pub use state::ResponseState;
