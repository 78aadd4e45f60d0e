//! HTTP binding for deferred responses.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, route policy lookup)
//!     → DeferredResponse created, registered, suspended
//!     → background worker resumes (or timer / cancel wins)
//!     → response.rs (outcome → status + body)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use response::X_REQUEST_ID;
pub use server::DeferredServer;
