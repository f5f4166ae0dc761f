//! # Background Health Checker
//!
//! Periodically probes every backend and updates its liveness on a ticker,
//! joining one probe task per backend per pass before the next tick fires.
//! Liveness is written in both directions: a backend that starts failing
//! its probe is marked dead, and one that recovers is marked alive again.

use crate::models::Backend;
use crate::store::BackendStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct HealthChecker {
    store: Arc<dyn BackendStore>,
    client: reqwest::Client,
    interval: Duration,
    running: Arc<AtomicBool>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl HealthChecker {
    pub fn new(store: Arc<dyn BackendStore>, interval: Duration, probe_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .expect("reqwest client builder failed");
        Self {
            store,
            client,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            task: tokio::sync::Mutex::new(None),
        }
    }

    /// Start the supervising loop. A second call while already running is a no-op.
    pub async fn start(&self) {
        let mut guard = self.task.lock().await;
        if guard.is_some() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);

        let store = self.store.clone();
        let client = self.client.clone();
        let interval = self.interval;
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            check_all(&store, &client).await;
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // consume the immediate first tick; the pass above already covered it
            while running.load(Ordering::SeqCst) {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                check_all(&store, &client).await;
            }
        });

        *guard = Some(handle);
    }

    /// Signal the loop to stop and wait for the in-flight pass to drain.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn check_all(store: &Arc<dyn BackendStore>, client: &reqwest::Client) {
    let backends = match store.get_all().await {
        Ok(backends) => backends,
        Err(err) => {
            warn!(error = %err, "health checker could not list backends");
            return;
        }
    };

    let probes = backends
        .into_iter()
        .map(|backend| probe_one(store.clone(), client.clone(), backend));
    futures_util::future::join_all(probes).await;
}

async fn probe_one(store: Arc<dyn BackendStore>, client: reqwest::Client, backend: Backend) {
    let is_alive = probe(&client, &backend).await;
    if is_alive != backend.is_alive {
        debug!(backend = %backend.url, alive = is_alive, "backend liveness changed");
        let _ = store.set_alive(backend.id, is_alive).await;
    }
}

async fn probe(client: &reqwest::Client, backend: &Backend) -> bool {
    match client.get(backend.health_url()).send().await {
        Ok(resp) => resp.status() == reqwest::StatusCode::OK,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryBackendStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn marks_backend_dead_after_failing_probe() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock)
            .await;

        let store = Arc::new(InMemoryBackendStore::new());
        let url = mock.uri().trim_start_matches("http://").to_string();
        let backend = store
            .add(Backend::seed(url))
            .await
            .unwrap();

        let client = reqwest::Client::new();
        check_all(&(store.clone() as Arc<dyn BackendStore>), &client).await;

        let updated = store.get_all().await.unwrap();
        let row = updated.iter().find(|b| b.id == backend.id).unwrap();
        assert!(!row.is_alive);
    }

    #[tokio::test]
    async fn marks_backend_alive_after_successful_probe() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;

        let store = Arc::new(InMemoryBackendStore::new());
        let url = mock.uri().trim_start_matches("http://").to_string();
        let backend = store.add(Backend::seed(url)).await.unwrap();
        store.set_alive(backend.id, false).await.unwrap();

        let client = reqwest::Client::new();
        check_all(&(store.clone() as Arc<dyn BackendStore>), &client).await;

        let updated = store.get_all().await.unwrap();
        let row = updated.iter().find(|b| b.id == backend.id).unwrap();
        assert!(row.is_alive);
    }
}
