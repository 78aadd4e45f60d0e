//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → PolicyTable shared via ArcSwap with the HTTP binding
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps in a new PolicyTable
//!     → new requests observe new route policies
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - A response keeps the window it was suspended with across reloads

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ListenerConfig, LogFormat, ObservabilityConfig, PolicyTable, RoutePolicy, ServiceConfig,
    TimeoutConfig,
};
pub use validation::ValidationError;
