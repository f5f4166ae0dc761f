//! # Application State
//!
//! Shared state handed to every handler: the two repositories, the chosen
//! selection strategy, the rate limiter, and the client used to forward
//! proxied requests upstream.

use crate::config::Config;
use crate::limiter::TokenBucketLimiter;
use crate::metrics::MetricsCollector;
use crate::store::memory::{InMemoryBackendStore, InMemoryClientStore};
use crate::store::{BackendStore, ClientStore};
use crate::strategy::{self, Strategy};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub backend_store: Arc<dyn BackendStore>,
    pub client_store: Arc<dyn ClientStore>,
    pub strategy: Arc<dyn Strategy>,
    pub limiter: Arc<TokenBucketLimiter>,
    pub http_client: reqwest::Client,
    pub metrics: Arc<MetricsCollector>,
}

impl AppState {
    /// Build application state from configuration: construct the stores,
    /// seed backends, and resolve the configured strategy by name.
    ///
    /// Fails fast with a non-zero exit if `config.strategy` doesn't name one
    /// of the built-in strategies.
    pub async fn new(config: Config) -> Self {
        let memory_backends = InMemoryBackendStore::new();
        memory_backends.seed(config.backends.clone()).await;
        let backend_store: Arc<dyn BackendStore> = Arc::new(memory_backends);
        let client_store: Arc<dyn ClientStore> = Arc::new(InMemoryClientStore::new());

        let strategy: Arc<dyn Strategy> = strategy::from_name(&config.strategy)
            .unwrap_or_else(|err| {
                eprintln!("fatal: {err}");
                std::process::exit(1);
            })
            .into();

        let limiter = Arc::new(TokenBucketLimiter::new(
            client_store.clone(),
            config.default_capacity,
            config.default_rate_per_sec,
        ));

        let http_client = reqwest::Client::builder()
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            backend_store,
            client_store,
            strategy,
            limiter,
            http_client,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeds_backends_from_config() {
        let config = Config::for_test();
        let state = AppState::new(config).await;
        let backends = state.backend_store.get_all().await.unwrap();
        assert_eq!(backends.len(), 1);
    }
}
