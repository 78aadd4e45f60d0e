//! Errors reported by state-changing operations.

use thiserror::Error;

use super::state::ResponseState;

/// State-changing operation on a deferred response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Resume,
    Cancel,
    SetTimeout,
    Suspend,
    ApplyPolicy,
    TimeoutFire,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Resume => "resume",
            Operation::Cancel => "cancel",
            Operation::SetTimeout => "set_timeout",
            Operation::Suspend => "suspend",
            Operation::ApplyPolicy => "apply_policy",
            Operation::TimeoutFire => "timeout_fire",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalid state transition.
///
/// Always recoverable: the caller should drop the attempted resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeferredError {
    /// The response already reached a terminal state.
    #[error("cannot {operation}: response already resolved ({state})")]
    AlreadyResolved {
        operation: Operation,
        state: ResponseState,
    },

    /// The operation is not allowed from the current non-terminal state.
    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        operation: Operation,
        state: ResponseState,
    },
}

impl DeferredError {
    pub fn operation(&self) -> Operation {
        match self {
            DeferredError::AlreadyResolved { operation, .. }
            | DeferredError::InvalidTransition { operation, .. } => *operation,
        }
    }

    pub fn state(&self) -> ResponseState {
        match self {
            DeferredError::AlreadyResolved { state, .. }
            | DeferredError::InvalidTransition { state, .. } => *state,
        }
    }

    pub fn is_already_resolved(&self) -> bool {
        matches!(self, DeferredError::AlreadyResolved { .. })
    }
}
