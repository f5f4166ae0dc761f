use super::Strategy;
use crate::error::ProxyError;
use crate::models::Backend;

/// Uniform random selection over the alive subset. `fastrand` is
/// thread-local and needs no state of its own.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for Random {
    fn next(&self, backends: &[Backend]) -> Result<Backend, ProxyError> {
        let alive: Vec<&Backend> = backends.iter().filter(|b| b.is_alive).collect();
        if alive.is_empty() {
            return Err(ProxyError::NoAliveBackends);
        }
        let idx = fastrand::usize(..alive.len());
        Ok(alive[idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn backend(id: u64, alive: bool) -> Backend {
        let now = Utc::now();
        Backend {
            id,
            url: format!("b{id}:80"),
            is_alive: alive,
            active_conns: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn only_ever_picks_alive_backends() {
        let r = Random::new();
        let backends = vec![backend(1, false), backend(2, true), backend(3, false)];
        for _ in 0..50 {
            assert_eq!(r.next(&backends).unwrap().id, 2);
        }
    }

    #[test]
    fn errors_when_none_alive() {
        let r = Random::new();
        assert!(matches!(
            r.next(&[backend(1, false)]),
            Err(ProxyError::NoAliveBackends)
        ));
    }
}
