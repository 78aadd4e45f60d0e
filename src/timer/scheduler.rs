//! Delayed execution for timeout windows.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// Callback run when a timer fires.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Opaque handle identifying one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

impl TimerHandle {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A generic delayed-execution facility.
pub trait TimeoutScheduler: Send + Sync {
    /// Run `callback` once after `after` has elapsed, unless cancelled first.
    fn schedule(&self, after: Duration, callback: TimerCallback) -> TimerHandle;

    /// Disarm a timer. Returns `true` if it was disarmed before firing.
    fn cancel(&self, handle: TimerHandle) -> bool;
}

/// Scheduler backed by tokio timers.
///
/// Each armed timer is a spawned task waiting on either its deadline or
/// the drop of its cancel sender. Whoever removes the map entry first
/// decides whether the callback runs.
pub struct TokioScheduler {
    runtime: Handle,
    next_id: AtomicU64,
    armed: Arc<DashMap<u64, oneshot::Sender<()>>>,
}

impl TokioScheduler {
    /// Create a scheduler spawning onto the given runtime.
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            next_id: AtomicU64::new(1),
            armed: Arc::new(DashMap::new()),
        }
    }

    /// Create a scheduler on the current runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Number of timers armed and not yet fired or cancelled.
    pub fn armed(&self) -> usize {
        self.armed.len()
    }
}

impl TimeoutScheduler for TokioScheduler {
    fn schedule(&self, after: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        self.armed.insert(id, cancel_tx);

        let armed = self.armed.clone();
        self.runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(after) => {
                    if armed.remove(&id).is_some() {
                        tracing::trace!(timer_id = id, "Timer fired");
                        callback();
                    }
                }
                _ = cancel_rx => {}
            }
        });

        TimerHandle(id)
    }

    fn cancel(&self, handle: TimerHandle) -> bool {
        // Dropping the sender wakes the timer task.
        let disarmed = self.armed.remove(&handle.0).is_some();
        if disarmed {
            tracing::trace!(timer_id = handle.0, "Timer cancelled");
        }
        disarmed
    }
}
