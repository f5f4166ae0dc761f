//! # Repository Contract
//!
//! The storage backend is an opaque collaborator behind two traits
//! (`BackendStore`, `ClientStore`); any implementation satisfying them,
//! in-memory, SQL, or otherwise, can back the rest of the crate. This
//! module defines the contract, plus a concurrent in-memory implementation
//! good enough to run and test the rest of the crate against.

pub mod memory;

use crate::error::ProxyError;
use crate::models::{Backend, Client};
use async_trait::async_trait;

/// Ordered set of backends with liveness and active-connection counters.
///
/// Callers may invoke any method from any thread. Reads observe a consistent
/// snapshot of each backend row; cross-row atomicity is not required.
#[async_trait]
pub trait BackendStore: Send + Sync {
    /// All backends, insertion order.
    async fn get_all(&self) -> Result<Vec<Backend>, ProxyError>;

    /// Backends with `is_alive = true`. Fails with `NoActiveBackends` if empty.
    async fn get_active(&self) -> Result<Vec<Backend>, ProxyError>;

    /// Assign an id, persist, and return the stored record.
    async fn add(&self, backend: Backend) -> Result<Backend, ProxyError>;

    /// Set liveness for `id`. Returns whether a row was updated.
    async fn set_alive(&self, id: u64, is_alive: bool) -> Result<bool, ProxyError>;

    /// Increment `active_conns` for `id` by one (least-connections accounting).
    async fn increment_conns(&self, id: u64);

    /// Decrement `active_conns` for `id` by one, saturating at zero.
    async fn decrement_conns(&self, id: u64);
}

/// Set of rate-limit clients (capacity, rate, remaining tokens, last refill).
///
/// All mutations are atomic per row; concurrent callers serialize on a
/// single client id but never block callers touching a different id.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// All clients.
    async fn get_all(&self) -> Result<Vec<Client>, ProxyError>;

    /// A single client by id. Fails with `ClientNotFound` when absent.
    async fn get_by_id(&self, id: u64) -> Result<Client, ProxyError>;

    /// Assign an id, persist, and return the stored record.
    async fn create(&self, client: Client) -> Result<Client, ProxyError>;

    /// Overwrite `tokens` and `last_updated = now` for `id`. Returns whether
    /// a row was updated.
    async fn update_tokens(&self, id: u64, tokens: i64, last_updated: chrono::DateTime<chrono::Utc>) -> Result<bool, ProxyError>;

    /// Apply an admin parameter update (capacity/rate_per_sec/tokens), each
    /// optional, and return the updated row. Fails with `ClientNotFound`
    /// when absent.
    async fn update_params(
        &self,
        id: u64,
        capacity: Option<i64>,
        rate_per_sec: Option<i64>,
        tokens: Option<i64>,
    ) -> Result<Client, ProxyError>;

    /// Remove a client. Fails with `ClientNotFound` when absent.
    async fn delete(&self, id: u64) -> Result<(), ProxyError>;
}
