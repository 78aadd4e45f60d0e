//! Response state machine.
//!
//! # States
//! - Pending: created, no timeout clock running
//! - SuspendedWithTimeout: handed off to background work, clock (if any) running
//! - Completed / TimedOut / Cancelled: terminal, absorbing
//!
//! # State Transitions
//! ```text
//! Pending → SuspendedWithTimeout: set_timeout() or suspend()
//! Pending → Completed:             resume() fast path
//! SuspendedWithTimeout → Completed: resume() / resume_with_error()
//! SuspendedWithTimeout → TimedOut:  timer fires first
//! Pending | SuspendedWithTimeout → Cancelled: cancel()
//! ```

use std::fmt;

/// Lifecycle state of a deferred response.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseState {
    Pending = 0,
    SuspendedWithTimeout = 1,
    Completed = 2,
    TimedOut = 3,
    Cancelled = 4,
}

impl ResponseState {
    /// True for Completed, TimedOut and Cancelled.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResponseState::Completed | ResponseState::TimedOut | ResponseState::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResponseState::Pending => "pending",
            ResponseState::SuspendedWithTimeout => "suspended",
            ResponseState::Completed => "completed",
            ResponseState::TimedOut => "timed_out",
            ResponseState::Cancelled => "cancelled",
        }
    }
}

impl From<u8> for ResponseState {
    fn from(val: u8) -> Self {
        match val {
            1 => ResponseState::SuspendedWithTimeout,
            2 => ResponseState::Completed,
            3 => ResponseState::TimedOut,
            4 => ResponseState::Cancelled,
            _ => ResponseState::Pending,
        }
    }
}

impl fmt::Display for ResponseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
