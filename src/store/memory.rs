//! # In-Memory Repository
//!
//! A concurrent in-memory implementation of [`BackendStore`] and
//! [`ClientStore`] backed by `dashmap::DashMap`. Good enough to run the
//! whole crate and its test suite without a live database; a `sqlx`-backed
//! store would implement the same two traits.

use super::{BackendStore, ClientStore};
use crate::error::ProxyError;
use crate::models::{Backend, Client};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// In-memory backend repository. Preserves insertion order for `get_all`
/// via a side list, since `DashMap` iteration order is unspecified.
#[derive(Debug, Default)]
pub struct InMemoryBackendStore {
    rows: DashMap<u64, Backend>,
    order: RwLock<Vec<u64>>,
    next_id: AtomicU64,
}

impl InMemoryBackendStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from configuration at startup.
    pub async fn seed(&self, urls: impl IntoIterator<Item = String>) {
        for url in urls {
            let _ = self.add(Backend::seed(url)).await;
        }
    }
}

#[async_trait]
impl BackendStore for InMemoryBackendStore {
    async fn get_all(&self) -> Result<Vec<Backend>, ProxyError> {
        let order = self.order.read().await;
        Ok(order
            .iter()
            .filter_map(|id| self.rows.get(id).map(|r| r.clone()))
            .collect())
    }

    async fn get_active(&self) -> Result<Vec<Backend>, ProxyError> {
        let active: Vec<Backend> = self
            .get_all()
            .await?
            .into_iter()
            .filter(|b| b.is_alive)
            .collect();

        if active.is_empty() {
            Err(ProxyError::NoActiveBackends)
        } else {
            Ok(active)
        }
    }

    async fn add(&self, mut backend: Backend) -> Result<Backend, ProxyError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        backend.id = id;
        let now = Utc::now();
        backend.created_at = now;
        backend.updated_at = now;
        self.rows.insert(id, backend.clone());
        self.order.write().await.push(id);
        Ok(backend)
    }

    async fn set_alive(&self, id: u64, is_alive: bool) -> Result<bool, ProxyError> {
        match self.rows.get_mut(&id) {
            Some(mut row) => {
                row.is_alive = is_alive;
                row.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_conns(&self, id: u64) {
        if let Some(mut row) = self.rows.get_mut(&id) {
            row.active_conns += 1;
        }
    }

    async fn decrement_conns(&self, id: u64) {
        if let Some(mut row) = self.rows.get_mut(&id) {
            row.active_conns = (row.active_conns - 1).max(0);
        }
    }
}

/// In-memory client repository.
#[derive(Debug, Default)]
pub struct InMemoryClientStore {
    rows: DashMap<u64, Client>,
    next_id: AtomicU64,
}

impl InMemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for InMemoryClientStore {
    async fn get_all(&self) -> Result<Vec<Client>, ProxyError> {
        Ok(self.rows.iter().map(|r| r.value().clone()).collect())
    }

    async fn get_by_id(&self, id: u64) -> Result<Client, ProxyError> {
        self.rows
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or(ProxyError::ClientNotFound(id))
    }

    async fn create(&self, mut client: Client) -> Result<Client, ProxyError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        client.id = id;
        self.rows.insert(id, client.clone());
        Ok(client)
    }

    async fn update_tokens(
        &self,
        id: u64,
        tokens: i64,
        last_updated: chrono::DateTime<Utc>,
    ) -> Result<bool, ProxyError> {
        match self.rows.get_mut(&id) {
            Some(mut row) => {
                row.tokens = tokens;
                row.last_updated = last_updated;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_params(
        &self,
        id: u64,
        capacity: Option<i64>,
        rate_per_sec: Option<i64>,
        tokens: Option<i64>,
    ) -> Result<Client, ProxyError> {
        let mut row = self.rows.get_mut(&id).ok_or(ProxyError::ClientNotFound(id))?;
        if let Some(capacity) = capacity {
            row.capacity = capacity;
            // Capacity shrunk below current tokens: clamp immediately rather
            // than wait for the next refill to notice.
            row.tokens = row.tokens.min(row.capacity);
        }
        if let Some(rate_per_sec) = rate_per_sec {
            row.rate_per_sec = rate_per_sec;
        }
        if let Some(tokens) = tokens {
            row.tokens = tokens.min(row.capacity);
        }
        Ok(row.clone())
    }

    async fn delete(&self, id: u64) -> Result<(), ProxyError> {
        self.rows
            .remove(&id)
            .map(|_| ())
            .ok_or(ProxyError::ClientNotFound(id))
    }
}
