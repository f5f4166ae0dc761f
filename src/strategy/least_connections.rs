use super::Strategy;
use crate::error::ProxyError;
use crate::models::Backend;

/// Picks the alive backend with the smallest `active_conns`, first one
/// wins ties. Holds no internal state: `active_conns` already lives on the
/// `Backend` snapshot the dispatcher hands in.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for LeastConnections {
    fn next(&self, backends: &[Backend]) -> Result<Backend, ProxyError> {
        backends
            .iter()
            .filter(|b| b.is_alive)
            .min_by_key(|b| b.active_conns)
            .cloned()
            .ok_or(ProxyError::NoAliveBackends)
    }
}
