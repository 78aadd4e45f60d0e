//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::deferred::{SuspendPolicy, TimeUnit};

/// Root configuration for the deferred response service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Default and shutdown timeouts.
    pub timeouts: TimeoutConfig,

    /// Declarative suspend policies per route.
    pub routes: Vec<RoutePolicy>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Window for routes without a policy, in seconds. `None` suspends without a deadline.
    pub default_secs: Option<u64>,

    /// How long shutdown waits for cancelled handlers to drain, in milliseconds.
    pub shutdown_grace_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: Some(30),
            shutdown_grace_ms: 500,
        }
    }
}

/// A named route with its declared suspend policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoutePolicy {
    /// Route identifier, matched against the request path.
    pub name: String,

    #[serde(flatten)]
    pub policy: SuspendPolicy,
}

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Route name → policy lookup built from a [`ServiceConfig`].
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    routes: HashMap<String, SuspendPolicy>,
    default_policy: Option<SuspendPolicy>,
}

impl PolicyTable {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            routes: config
                .routes
                .iter()
                .map(|r| (r.name.clone(), r.policy))
                .collect(),
            default_policy: config
                .timeouts
                .default_secs
                .map(|secs| SuspendPolicy::new(secs, TimeUnit::Seconds)),
        }
    }

    /// Policy declared for `route`, if any.
    pub fn policy(&self, route: &str) -> Option<SuspendPolicy> {
        self.routes.get(route).copied()
    }

    /// Policy applied when a route declares none.
    pub fn default_policy(&self) -> Option<SuspendPolicy> {
        self.default_policy
    }

    /// Policy for `route`, falling back to the service default.
    pub fn resolve(&self, route: &str) -> Option<SuspendPolicy> {
        self.policy(route).or(self.default_policy)
    }

    /// Declared route names, sorted.
    pub fn route_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.routes.keys().cloned().collect();
        names.sort();
        names
    }
}
