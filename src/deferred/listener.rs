//! Resolution listeners and listener failure isolation.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use uuid::Uuid;

use super::outcome::Outcome;
use crate::observability::metrics;

/// Callback observing the terminal outcome. Invoked at most once.
pub type Listener<T> = Box<dyn FnOnce(Arc<Outcome<T>>) + Send + 'static>;

/// Destination for listener failures.
pub trait ErrorSink: Send + Sync {
    /// A listener panicked while being notified.
    fn listener_failed(&self, response_id: Uuid, listener_index: usize, message: &str);
}

/// Default sink: structured error log plus a failure counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn listener_failed(&self, response_id: Uuid, listener_index: usize, message: &str) {
        tracing::error!(
            response_id = %response_id,
            listener = listener_index,
            error = %message,
            "Resolution listener failed"
        );
        metrics::record_listener_failure();
    }
}

/// Invoke listeners in registration order. A panicking listener is reported
/// to `sink` and does not stop the remaining ones.
pub(crate) fn notify_all<T>(
    response_id: Uuid,
    listeners: Vec<(usize, Listener<T>)>,
    outcome: &Arc<Outcome<T>>,
    sink: &dyn ErrorSink,
) {
    for (index, listener) in listeners {
        notify_one(response_id, index, listener, outcome, sink);
    }
}

pub(crate) fn notify_one<T>(
    response_id: Uuid,
    index: usize,
    listener: Listener<T>,
    outcome: &Arc<Outcome<T>>,
    sink: &dyn ErrorSink,
) {
    let outcome = outcome.clone();
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || listener(outcome))) {
        sink.listener_failed(response_id, index, &panic_message(payload.as_ref()));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "listener panicked".to_string()
    }
}
