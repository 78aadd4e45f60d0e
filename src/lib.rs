//! Deferred response completion for request/response services.
//!
//! A [`DeferredResponse`] represents one in-flight request whose result is
//! produced later, off the task that received it. Exactly one of resume,
//! timeout or cancel terminates it; every other attempt is rejected.

pub mod config;
pub mod deferred;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod timer;

pub use config::ServiceConfig;
pub use deferred::{DeferredError, DeferredResponse, Outcome, ResponseState};
pub use http::DeferredServer;
pub use lifecycle::Shutdown;
pub use timer::{TimeoutScheduler, TokioScheduler};
