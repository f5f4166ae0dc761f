//! # nnlb - reverse-proxy HTTP load balancer
//!
//! Forwards client requests to one of a pool of backend HTTP servers,
//! chosen by a pluggable selection strategy, behind a per-client
//! token-bucket rate limiter and a concurrent background health checker.
//!
//! ## Architecture
//!
//! - [`models`]: the `Backend`/`Client` domain types.
//! - [`store`]: the repository contract (`BackendStore`/`ClientStore`)
//!   and an in-memory implementation.
//! - [`strategy`]: round-robin, random, and least-connections selection.
//! - [`limiter`]: the per-client token-bucket rate limiter.
//! - [`health`]: the background liveness checker.
//! - [`config`]: CLI/env configuration.
//! - [`error`]: the error taxonomy and its HTTP mapping.
//! - [`server`]: the router, application state, and request handlers.
//! - [`graceful_shutdown`]: signal handling and shutdown sequencing.
//! - [`metrics`]: in-process request counters.

pub mod config;
pub mod error;
pub mod graceful_shutdown;
pub mod health;
pub mod limiter;
pub mod metrics;
pub mod models;
pub mod store;
pub mod strategy;

#[cfg(feature = "server")]
pub mod server;

pub use config::Config;
pub use error::ProxyError;
pub use models::{Backend, Client};

#[cfg(feature = "server")]
pub use server::{create_router, AppState};

pub type Result<T> = std::result::Result<T, ProxyError>;
