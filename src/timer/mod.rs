//! Timeout scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! DeferredResponse::set_timeout / suspend
//!     → TimeoutScheduler::schedule(after, callback) → TimerHandle
//!     → callback races resume/cancel for the terminal transition
//!
//! Reschedule or resolution:
//!     → TimeoutScheduler::cancel(handle)
//! ```
//!
//! # Design Decisions
//! - Scheduler is a trait so responses never depend on a concrete runtime
//! - Cancel and fire race on a single map removal; exactly one wins

pub mod scheduler;

pub use scheduler::{TimeoutScheduler, TimerCallback, TimerHandle, TokioScheduler};
