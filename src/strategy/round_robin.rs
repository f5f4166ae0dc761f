use super::Strategy;
use crate::error::ProxyError;
use crate::models::Backend;
use std::sync::atomic::{AtomicU64, Ordering};

/// Circular selection over the alive subset, via an atomic counter taken
/// modulo the size of that subset.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicU64,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for RoundRobin {
    fn next(&self, backends: &[Backend]) -> Result<Backend, ProxyError> {
        let alive: Vec<&Backend> = backends.iter().filter(|b| b.is_alive).collect();
        if alive.is_empty() {
            return Err(ProxyError::NoAliveBackends);
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) as usize % alive.len();
        Ok(alive[idx].clone())
    }
}
