//! # Token-Bucket Rate Limiter
//!
//! One bucket per client, refilled by elapsed wall-clock time rather than a
//! background tick: load the client, compute tokens accrued since
//! `last_updated`, clamp to capacity, persist, then admit iff at least one
//! token remains.

use crate::error::ProxyError;
use crate::models::Client;
use crate::store::ClientStore;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Serializes admission checks process-wide. A per-client lock would allow
/// more concurrency but isn't required for correctness here.
pub struct TokenBucketLimiter {
    store: Arc<dyn ClientStore>,
    default_capacity: i64,
    default_rate_per_sec: i64,
    guard: Mutex<()>,
}

impl TokenBucketLimiter {
    pub fn new(store: Arc<dyn ClientStore>, default_capacity: i64, default_rate_per_sec: i64) -> Self {
        Self {
            store,
            default_capacity,
            default_rate_per_sec,
            guard: Mutex::new(()),
        }
    }

    pub fn default_capacity(&self) -> i64 {
        self.default_capacity
    }

    pub fn default_rate_per_sec(&self) -> i64 {
        self.default_rate_per_sec
    }

    /// Register a brand-new client with the configured defaults, bucket full.
    pub async fn register(&self) -> Result<Client, ProxyError> {
        self.store
            .create(Client::new(self.default_capacity, self.default_rate_per_sec))
            .await
    }

    /// Admit or reject one request for `client_id`.
    ///
    /// Fails with `ClientNotFound` if the id is unknown, `RateLimitExceeded`
    /// if the bucket is empty after refill.
    pub async fn allow(&self, client_id: u64) -> Result<(), ProxyError> {
        let _permit = self.guard.lock().await;

        let client = self.store.get_by_id(client_id).await?;

        let now = Utc::now();
        let elapsed_secs = (now - client.last_updated).num_milliseconds().max(0) as f64 / 1000.0;
        let accrued = (elapsed_secs * client.rate_per_sec as f64).floor() as i64;

        let mut tokens = client.tokens;
        let mut last_updated = client.last_updated;
        if accrued > 0 {
            tokens = (tokens + accrued).min(client.capacity);
            last_updated = now;
            self.store
                .update_tokens(client_id, tokens, last_updated)
                .await?;
        }

        if tokens <= 0 {
            return Err(ProxyError::RateLimitExceeded);
        }

        tokens -= 1;
        self.store.update_tokens(client_id, tokens, last_updated).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryClientStore;

    async fn limiter_with_client(capacity: i64, rate: i64) -> (TokenBucketLimiter, u64) {
        let store: Arc<dyn ClientStore> = Arc::new(InMemoryClientStore::new());
        let limiter = TokenBucketLimiter::new(store.clone(), capacity, rate);
        let client = limiter.register().await.unwrap();
        (limiter, client.id)
    }

    #[tokio::test]
    async fn admits_until_capacity_exhausted_then_rejects() {
        let (limiter, id) = limiter_with_client(3, 0).await;
        assert!(limiter.allow(id).await.is_ok());
        assert!(limiter.allow(id).await.is_ok());
        assert!(limiter.allow(id).await.is_ok());
        assert!(matches!(
            limiter.allow(id).await,
            Err(ProxyError::RateLimitExceeded)
        ));
    }

    #[tokio::test]
    async fn unknown_client_is_rejected_with_not_found() {
        let store: Arc<dyn ClientStore> = Arc::new(InMemoryClientStore::new());
        let limiter = TokenBucketLimiter::new(store, 10, 1);
        assert!(matches!(
            limiter.allow(999).await,
            Err(ProxyError::ClientNotFound(999))
        ));
    }

    #[tokio::test]
    async fn refill_never_exceeds_capacity() {
        let store: Arc<dyn ClientStore> = Arc::new(InMemoryClientStore::new());
        let limiter = TokenBucketLimiter::new(store.clone(), 2, 1000);
        let client = limiter.register().await.unwrap();
        store
            .update_tokens(client.id, 0, Utc::now() - chrono::Duration::seconds(100))
            .await
            .unwrap();
        limiter.allow(client.id).await.unwrap();
        let refreshed = store.get_by_id(client.id).await.unwrap();
        assert!(refreshed.tokens <= 2);
    }
}
