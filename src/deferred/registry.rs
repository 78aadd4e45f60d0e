//! Registry of in-flight responses.

use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use super::error::DeferredError;
use super::response::DeferredResponse;
use crate::observability::metrics;

/// A thread-safe table of responses that have not yet resolved.
///
/// Entries remove themselves when their response resolves.
pub struct ResponseRegistry<T> {
    inner: Arc<DashMap<Uuid, DeferredResponse<T>>>,
}

impl<T> Clone for ResponseRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for ResponseRegistry<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }
}

impl<T: Send + Sync + 'static> ResponseRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `response` until it resolves.
    pub fn register(&self, response: &DeferredResponse<T>) {
        let id = response.id();
        self.inner.insert(id, response.clone());
        metrics::record_in_flight(self.inner.len());

        let inner = self.inner.clone();
        response.on_resolved(move |_| {
            inner.remove(&id);
            metrics::record_in_flight(inner.len());
        });
    }

    pub fn get(&self, id: &Uuid) -> Option<DeferredResponse<T>> {
        self.inner.get(id).map(|r| r.value().clone())
    }

    /// Cancel one response. `None` if it is not tracked.
    pub fn cancel(&self, id: &Uuid) -> Option<Result<(), DeferredError>> {
        // Clone out first: cancelling runs the removal listener.
        let response = self.get(id)?;
        Some(response.cancel())
    }

    /// Cancel every tracked response. Returns how many this call cancelled.
    pub fn cancel_all(&self) -> usize {
        let pending: Vec<DeferredResponse<T>> =
            self.inner.iter().map(|r| r.value().clone()).collect();

        let cancelled = pending.iter().filter(|r| r.cancel().is_ok()).count();
        if cancelled > 0 {
            tracing::info!(cancelled, "Cancelled in-flight responses");
        }
        cancelled
    }

    /// Ids of unresolved responses.
    pub fn ids(&self) -> Vec<Uuid> {
        self.inner.iter().map(|r| *r.key()).collect()
    }

    /// Number of unresolved responses.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
