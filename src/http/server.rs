//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Apply the route's declared suspend policy before the handler body runs
//! - Hand each response to a background worker and wait for its outcome
//! - Cancel in-flight responses on shutdown
//! - Swap in reloaded route policies

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::{PolicyTable, ServiceConfig};
use crate::deferred::{DeferredResponse, ResponseRegistry};
use crate::http::response::{outcome_response, rejection_response};
use crate::observability::metrics;
use crate::timer::{TimeoutScheduler, TokioScheduler};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<dyn TimeoutScheduler>,
    pub registry: ResponseRegistry<String>,
    pub policies: Arc<ArcSwap<PolicyTable>>,
}

/// Query parameters driving the demo worker.
#[derive(Debug, Default, Deserialize)]
pub struct WorkParams {
    /// How long the worker runs before resuming.
    #[serde(default)]
    pub delay_ms: u64,

    /// Value to resume with (default: "ok").
    pub value: Option<String>,

    /// Resume with an error instead of a value.
    #[serde(default)]
    pub fail: bool,

    /// Programmatic timeout, overriding the route's declared policy.
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub version: String,
    pub in_flight: usize,
    pub pending: Vec<Uuid>,
    pub routes: Vec<String>,
}

/// HTTP server binding deferred responses to requests.
pub struct DeferredServer {
    router: Router,
    state: AppState,
}

impl DeferredServer {
    /// Create a new server with the given configuration.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn new(config: ServiceConfig) -> Self {
        let state = AppState {
            scheduler: Arc::new(TokioScheduler::current()),
            registry: ResponseRegistry::new(),
            policies: Arc::new(ArcSwap::from_pointee(PolicyTable::from_config(&config))),
        };

        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/deferred/{route}", get(deferred_handler))
            .route("/deferred/{id}/cancel", post(cancel_handler))
            .route("/status", get(status_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Registry of responses currently in flight.
    pub fn registry(&self) -> ResponseRegistry<String> {
        self.state.registry.clone()
    }

    /// Run the server until `shutdown` fires.
    ///
    /// On shutdown every in-flight response is cancelled so waiting
    /// handlers complete before connections drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ServiceConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let policies = self.state.policies.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                let table = PolicyTable::from_config(&config);
                tracing::info!(routes = ?table.route_names(), "Route policies reloaded");
                policies.store(Arc::new(table));
            }
        });

        let registry = self.state.registry.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!(in_flight = registry.len(), "Shutdown signal received");
                registry.cancel_all();
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn deferred_handler(
    State(state): State<AppState>,
    Path(route): Path<String>,
    Query(params): Query<WorkParams>,
) -> Response {
    let start = Instant::now();
    let response: DeferredResponse<String> = DeferredResponse::new(state.scheduler.clone());
    state.registry.register(&response);
    let _guard = CancelOnDrop(response.clone());

    // Declarative policy first; the handler body may override it.
    let declared = state.policies.load().resolve(&route);

    let suspended = match (declared, params.timeout_ms) {
        (_, Some(ms)) => response.set_timeout(Duration::from_millis(ms)),
        (Some(policy), None) => response
            .apply_policy(&policy)
            .and_then(|_| response.suspend()),
        (None, None) => response.suspend(),
    };
    if let Err(e) = suspended {
        tracing::warn!(response_id = %response.id(), error = %e, "Failed to suspend response");
        metrics::record_request(&route, StatusCode::CONFLICT.as_u16(), start);
        return rejection_response(&e);
    }

    tracing::debug!(
        response_id = %response.id(),
        route = %route,
        timeout = ?response.timeout(),
        delay_ms = params.delay_ms,
        "Request suspended"
    );

    let worker = response.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(params.delay_ms)) => {}
            outcome = worker.wait() => {
                tracing::trace!(response_id = %worker.id(), outcome = outcome.kind(), "Worker stopped early");
                return;
            }
        }
        let result = if params.fail {
            worker.resume_with_error(params.value.unwrap_or_else(|| "worker failed".to_string()))
        } else {
            worker.resume(params.value.unwrap_or_else(|| "ok".to_string()))
        };
        if let Err(e) = result {
            tracing::debug!(response_id = %worker.id(), error = %e, "Worker result discarded");
        }
    });

    let outcome = response.wait().await;
    let reply = outcome_response(response.id(), &outcome);
    metrics::record_request(&route, reply.status().as_u16(), start);
    reply
}

/// Cancels a still-unresolved response when the handler future is dropped,
/// e.g. because the client disconnected.
struct CancelOnDrop(DeferredResponse<String>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.0.is_done() {
            return;
        }
        if self.0.cancel().is_ok() {
            tracing::debug!(response_id = %self.0.id(), "Client went away, response cancelled");
        }
    }
}

async fn cancel_handler(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.registry.cancel(&id) {
        Some(Ok(())) => {
            tracing::info!(response_id = %id, "Response cancelled");
            StatusCode::ACCEPTED.into_response()
        }
        Some(Err(e)) => rejection_response(&e),
        None => (StatusCode::NOT_FOUND, "unknown or resolved response").into_response(),
    }
}

async fn status_handler(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        in_flight: state.registry.len(),
        pending: state.registry.ids(),
        routes: state.policies.load().route_names(),
    })
}
