//! The deferred response handle.
//!
//! # Responsibilities
//! - Own completion state, timeout window, outcome and listeners of one request
//! - Arbitrate resume / timeout / cancel so exactly one terminator wins
//! - Arm, re-arm and disarm the timeout through a [`TimeoutScheduler`]
//! - Notify listeners outside of any lock
//!
//! # Design Decisions
//! - The state byte is changed only by compare-and-set inside a short critical
//!   section that also publishes the outcome; `is_done`/`state` read it lock-free
//! - Every (re)armed timer carries a generation; a timer whose generation is
//!   no longer current is rejected even if it already started firing
//! - Programmatic `set_timeout` overrides a declared [`SuspendPolicy`]

use std::error::Error;
use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use uuid::Uuid;

use super::error::{DeferredError, Operation};
use super::listener::{self, ErrorSink, Listener, TracingSink};
use super::outcome::{Outcome, TimeoutFailure};
use super::policy::{SuspendPolicy, TimeUnit};
use super::state::ResponseState;
use crate::observability::metrics;
use crate::timer::{TimeoutScheduler, TimerHandle};

/// One in-flight request whose result is produced later.
///
/// Cloning yields another handle to the same response; hand a clone to the
/// background worker and keep one in the transport.
pub struct DeferredResponse<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    id: Uuid,
    state: AtomicU8,
    core: Mutex<Core<T>>,
    resolved: Notify,
    scheduler: Arc<dyn TimeoutScheduler>,
    sink: Arc<dyn ErrorSink>,
    created_at: Instant,
}

struct Core<T> {
    outcome: Option<Arc<Outcome<T>>>,
    listeners: Vec<(usize, Listener<T>)>,
    next_listener: usize,
    /// Window declared before suspension.
    declared: Option<Duration>,
    /// Window the running clock was started with.
    active: Option<Duration>,
    timer: Option<TimerHandle>,
    generation: u64,
}

impl<T> Clone for DeferredResponse<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for DeferredResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredResponse")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .finish()
    }
}

impl<T> DeferredResponse<T> {
    /// Unique id of this response.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    /// Current state. Never blocks.
    pub fn state(&self) -> ResponseState {
        ResponseState::from(self.inner.state.load(Ordering::Acquire))
    }

    /// True once a terminal state has been reached, and forever after.
    ///
    /// Never blocks. Prefer [`DeferredResponse::wait`] or a listener over
    /// polling this in a loop.
    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// The terminal outcome, if resolved.
    pub fn outcome(&self) -> Option<Arc<Outcome<T>>> {
        self.lock_core().outcome.clone()
    }

    /// The running timeout window, or the declared one if not yet suspended.
    pub fn timeout(&self) -> Option<Duration> {
        let core = self.lock_core();
        core.active.or(core.declared)
    }

    /// Time since the response was created.
    pub fn elapsed(&self) -> Duration {
        self.inner.created_at.elapsed()
    }

    fn lock_core(&self) -> MutexGuard<'_, Core<T>> {
        // Nothing panics while the lock is held; recover the guard regardless.
        self.inner.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reject(&self, operation: Operation, state: ResponseState) -> DeferredError {
        metrics::record_rejection(operation.as_str());
        tracing::debug!(
            response_id = %self.inner.id,
            operation = %operation,
            state = %state,
            "Rejected state transition"
        );
        if state.is_terminal() {
            DeferredError::AlreadyResolved { operation, state }
        } else {
            DeferredError::InvalidTransition { operation, state }
        }
    }
}

impl<T: Send + Sync + 'static> DeferredResponse<T> {
    /// Create a pending response whose timeouts run on `scheduler`.
    pub fn new(scheduler: Arc<dyn TimeoutScheduler>) -> Self {
        Self::with_error_sink(scheduler, Arc::new(TracingSink))
    }

    /// Create a pending response reporting listener failures to `sink`.
    pub fn with_error_sink(scheduler: Arc<dyn TimeoutScheduler>, sink: Arc<dyn ErrorSink>) -> Self {
        let id = Uuid::new_v4();
        tracing::trace!(response_id = %id, "Deferred response created");
        Self {
            inner: Arc::new(Inner {
                id,
                state: AtomicU8::new(ResponseState::Pending as u8),
                core: Mutex::new(Core {
                    outcome: None,
                    listeners: Vec::new(),
                    next_listener: 0,
                    declared: None,
                    active: None,
                    timer: None,
                    generation: 0,
                }),
                resolved: Notify::new(),
                scheduler,
                sink,
                created_at: Instant::now(),
            }),
        }
    }

    /// Attach a declared timeout. Only allowed while pending; replaces any
    /// previously declared window. The clock starts on [`suspend`](Self::suspend).
    pub fn apply_policy(&self, policy: &SuspendPolicy) -> Result<(), DeferredError> {
        let mut core = self.lock_core();
        let state = self.state();
        if state != ResponseState::Pending {
            drop(core);
            return Err(self.reject(Operation::ApplyPolicy, state));
        }
        core.declared = Some(policy.duration());
        Ok(())
    }

    /// Suspend the response, starting the declared timeout window if any.
    pub fn suspend(&self) -> Result<(), DeferredError> {
        let armed = {
            let mut core = self.lock_core();
            if let Err(state) = self.cas(ResponseState::Pending, ResponseState::SuspendedWithTimeout) {
                drop(core);
                return Err(self.reject(Operation::Suspend, state));
            }
            match core.declared {
                Some(window) => {
                    core.generation += 1;
                    core.active = Some(window);
                    Some((window, core.generation))
                }
                None => None,
            }
        };

        tracing::debug!(
            response_id = %self.inner.id,
            timeout_ms = armed.map(|(window, _)| window.as_millis() as u64),
            "Deferred response suspended"
        );

        if let Some((window, generation)) = armed {
            self.arm(window, generation);
        }
        Ok(())
    }

    /// Set the timeout window.
    ///
    /// From pending this suspends and starts the clock. While suspended it
    /// cancels the running timer and restarts the clock with `window`.
    /// Rejected once terminal.
    pub fn set_timeout(&self, window: Duration) -> Result<(), DeferredError> {
        let (generation, previous) = {
            let mut core = self.lock_core();
            let state = self.state();
            if state.is_terminal() {
                drop(core);
                return Err(self.reject(Operation::SetTimeout, state));
            }
            if state == ResponseState::Pending {
                if let Err(state) =
                    self.cas(ResponseState::Pending, ResponseState::SuspendedWithTimeout)
                {
                    drop(core);
                    return Err(self.reject(Operation::SetTimeout, state));
                }
            }
            core.generation += 1;
            core.active = Some(window);
            (core.generation, core.timer.take())
        };

        if let Some(handle) = previous {
            self.inner.scheduler.cancel(handle);
        }

        tracing::debug!(
            response_id = %self.inner.id,
            timeout_ms = window.as_millis() as u64,
            rescheduled = previous.is_some(),
            "Timeout set"
        );

        self.arm(window, generation);
        Ok(())
    }

    /// [`set_timeout`](Self::set_timeout) with an amount and unit.
    pub fn set_timeout_in(&self, amount: u64, unit: TimeUnit) -> Result<(), DeferredError> {
        self.set_timeout(unit.to_duration(amount))
    }

    /// Complete with a value. Exactly one concurrent producer succeeds.
    pub fn resume(&self, value: T) -> Result<(), DeferredError> {
        self.resolve(Operation::Resume, Outcome::Completed(value), None)
    }

    /// Complete with a failure.
    pub fn resume_with_error<E>(&self, error: E) -> Result<(), DeferredError>
    where
        E: Into<Box<dyn Error + Send + Sync + 'static>>,
    {
        let failure: Arc<dyn Error + Send + Sync + 'static> = Arc::from(error.into());
        self.resolve(Operation::Resume, Outcome::Failed(failure), None)
    }

    /// Cancel the response.
    ///
    /// Cooperative: in-flight work keeps running, but its later `resume`
    /// is rejected.
    pub fn cancel(&self) -> Result<(), DeferredError> {
        self.resolve(Operation::Cancel, Outcome::Cancelled, None)
    }

    /// Register a listener for the terminal outcome.
    ///
    /// Listeners run in registration order on the thread performing the
    /// terminal transition. If already resolved, the listener runs now on
    /// the calling thread.
    pub fn on_resolved<F>(&self, listener: F)
    where
        F: FnOnce(Arc<Outcome<T>>) + Send + 'static,
    {
        let mut core = self.lock_core();
        let index = core.next_listener;
        core.next_listener += 1;
        match core.outcome.clone() {
            Some(outcome) => {
                drop(core);
                listener::notify_one(
                    self.inner.id,
                    index,
                    Box::new(listener),
                    &outcome,
                    self.inner.sink.as_ref(),
                );
            }
            None => core.listeners.push((index, Box::new(listener))),
        }
    }

    /// Wait for the terminal outcome.
    pub async fn wait(&self) -> Arc<Outcome<T>> {
        loop {
            let notified = self.inner.resolved.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    fn cas(&self, from: ResponseState, to: ResponseState) -> Result<(), ResponseState> {
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ResponseState::from)
    }

    /// Arm a timer for `generation`. If the generation went stale while the
    /// timer was being scheduled, disarm it again.
    fn arm(&self, window: Duration, generation: u64) {
        let response = self.clone();
        let handle = self.inner.scheduler.schedule(
            window,
            Box::new(move || {
                if let Err(e) = response.fire_timeout(generation, window) {
                    tracing::trace!(response_id = %response.id(), error = %e, "Timer fired late");
                }
            }),
        );

        let stale = {
            let mut core = self.lock_core();
            if core.generation == generation && !self.is_done() {
                core.timer = Some(handle);
                false
            } else {
                true
            }
        };
        if stale {
            self.inner.scheduler.cancel(handle);
        }
    }

    fn fire_timeout(&self, generation: u64, window: Duration) -> Result<(), DeferredError> {
        self.resolve(
            Operation::TimeoutFire,
            Outcome::TimedOut(TimeoutFailure { after: window }),
            Some(generation),
        )
    }

    /// The single terminal transition. First caller wins.
    fn resolve(
        &self,
        operation: Operation,
        outcome: Outcome<T>,
        generation: Option<u64>,
    ) -> Result<(), DeferredError> {
        let current = self.state();
        if current.is_terminal() {
            return Err(self.reject(operation, current));
        }

        let target = outcome.state();
        let (outcome, listeners, timer) = {
            let mut core = self.lock_core();
            if let Some(generation) = generation {
                if generation != core.generation {
                    let state = self.state();
                    drop(core);
                    return Err(self.reject(operation, state));
                }
            }

            let mut observed = self.state();
            loop {
                if observed.is_terminal() {
                    drop(core);
                    return Err(self.reject(operation, observed));
                }
                match self.cas(observed, target) {
                    Ok(()) => break,
                    Err(actual) => observed = actual,
                }
            }

            let outcome = Arc::new(outcome);
            core.outcome = Some(outcome.clone());
            (outcome, mem::take(&mut core.listeners), core.timer.take())
        };

        if let Some(handle) = timer {
            self.inner.scheduler.cancel(handle);
        }
        self.inner.resolved.notify_waiters();

        let elapsed = self.inner.created_at.elapsed();
        metrics::record_transition(outcome.kind(), elapsed);
        tracing::debug!(
            response_id = %self.inner.id,
            outcome = outcome.kind(),
            elapsed_ms = elapsed.as_millis() as u64,
            listeners = listeners.len(),
            "Deferred response resolved"
        );

        listener::notify_all(self.inner.id, listeners, &outcome, self.inner.sink.as_ref());
        Ok(())
    }
}
