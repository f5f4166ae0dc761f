//! # Domain Model
//!
//! The two entities the whole crate turns around: `Backend` (an upstream
//! origin) and `Client` (a rate-limit subject). Stores exclusively own these;
//! every other component receives them by value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An upstream HTTP server this load balancer forwards requests to.
///
/// `(id, url)` is unique within a store. `active_conns` is mutated only by
/// the dispatcher (increment on selection, decrement on completion);
/// `is_alive` is mutated only by the health checker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backend {
    pub id: u64,
    pub url: String,
    pub is_alive: bool,
    pub active_conns: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Backend {
    /// Construct a backend as it would be seeded from configuration:
    /// alive until the first health-check pass proves otherwise, id
    /// assigned by the store on insertion.
    pub fn seed(url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            url: url.into(),
            is_alive: true,
            active_conns: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// `http://<url>`, the origin proxied requests are forwarded to.
    pub fn origin(&self) -> String {
        format!("http://{}", self.url)
    }

    /// `http://<url>/health`, the probe target for the health checker.
    pub fn health_url(&self) -> String {
        format!("http://{}/health", self.url)
    }
}

/// A rate-limit subject, identified by an integer id distinct from any TCP
/// peer or backend identity.
///
/// Invariant: `0 <= tokens <= capacity` after every operation performed by
/// the limiter or the admin API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: u64,
    pub capacity: i64,
    pub rate_per_sec: i64,
    pub tokens: i64,
    pub last_updated: DateTime<Utc>,
}

impl Client {
    /// A freshly created client, bucket full.
    pub fn new(capacity: i64, rate_per_sec: i64) -> Self {
        Self {
            id: 0,
            capacity,
            rate_per_sec,
            tokens: capacity,
            last_updated: Utc::now(),
        }
    }
}
