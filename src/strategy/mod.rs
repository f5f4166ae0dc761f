//! # Selection Strategies
//!
//! A `Strategy` picks one backend out of a snapshot already filtered to
//! `is_alive = true` by the dispatcher. Each implementation still filters
//! defensively rather than trusting its caller to have done so.

pub mod least_connections;
pub mod random;
pub mod round_robin;

use crate::error::ProxyError;
use crate::models::Backend;

pub use least_connections::LeastConnections;
pub use random::Random;
pub use round_robin::RoundRobin;

/// Picks one backend from a slice of candidates.
///
/// Implementations are `Send + Sync` and shared behind an `Arc` across the
/// whole server; any internal state must be safe for concurrent selection.
pub trait Strategy: Send + Sync {
    fn next(&self, backends: &[Backend]) -> Result<Backend, ProxyError>;
}

/// Normalizes a configured strategy name so `round-robin` (the spelling
/// spec.md uses) and `round_robin` are accepted interchangeably.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('-', "_")
}

/// The strategy names accepted by configuration.
pub fn from_name(name: &str) -> Result<Box<dyn Strategy>, ProxyError> {
    match normalize_name(name).as_str() {
        "round_robin" => Ok(Box::new(RoundRobin::new())),
        "random" => Ok(Box::new(Random::new())),
        "least_connections" => Ok(Box::new(LeastConnections::new())),
        _ => Err(ProxyError::BadRequest(format!(
            "unknown selection strategy: {name}"
        ))),
    }
}
