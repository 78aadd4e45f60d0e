//! Terminal outcomes.

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::state::ResponseState;

/// Failure supplied by a producer through `resume_with_error`.
pub type Failure = Arc<dyn Error + Send + Sync + 'static>;

/// Synthetic failure recorded when the timeout window elapses first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("request timed out after {}ms", .after.as_millis())]
pub struct TimeoutFailure {
    /// The window that elapsed.
    pub after: Duration,
}

/// The terminal outcome of a deferred response. Set exactly once.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// Background work produced a value.
    Completed(T),
    /// Background work completed with an error.
    Failed(Failure),
    /// The timeout window elapsed before any producer resumed.
    TimedOut(TimeoutFailure),
    /// Cancelled before any producer resumed.
    Cancelled,
}

impl<T> Outcome<T> {
    /// The terminal state this outcome corresponds to.
    ///
    /// An explicit failure is still a completion.
    pub fn state(&self) -> ResponseState {
        match self {
            Outcome::Completed(_) | Outcome::Failed(_) => ResponseState::Completed,
            Outcome::TimedOut(_) => ResponseState::TimedOut,
            Outcome::Cancelled => ResponseState::Cancelled,
        }
    }

    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Completed(_) => "completed",
            Outcome::Failed(_) => "failed",
            Outcome::TimedOut(_) => "timed_out",
            Outcome::Cancelled => "cancelled",
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Completed(value) => Some(value),
            _ => None,
        }
    }

    /// The failure cause, either the producer's error or the synthetic timeout.
    pub fn failure(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            Outcome::Failed(err) => Some(err.as_ref()),
            Outcome::TimedOut(timeout) => Some(timeout),
            _ => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Outcome::TimedOut(_))
    }
}
