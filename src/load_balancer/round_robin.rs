//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{Endpoint, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through endpoints.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        if endpoints.is_empty() {
            return None;
        }

        // Rotate over the healthy subset only.
        let healthy: Vec<&Arc<Endpoint>> = endpoints.iter().filter(|ep| ep.is_healthy()).collect();
        if healthy.is_empty() {
            return None;
        }
        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        Some(Arc::clone(healthy[start % healthy.len()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::{EndpointAddr, HealthState};
    use std::collections::HashMap;

    fn endpoints(n: u16) -> Vec<Arc<Endpoint>> {
        (0..n)
            .map(|i| Arc::new(Endpoint::new(EndpointAddr::new("127.0.0.1", 8080 + i))))
            .collect()
    }

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let eps = endpoints(2);

        assert_eq!(lb.next_server(&eps).unwrap().port(), 8080);
        assert_eq!(lb.next_server(&eps).unwrap().port(), 8081);
        assert_eq!(lb.next_server(&eps).unwrap().port(), 8080);
    }

    #[test]
    fn test_nine_calls_spread_evenly() {
        let lb = RoundRobin::new();
        let eps = endpoints(3);
        let mut hits: HashMap<u16, usize> = HashMap::new();
        for _ in 0..9 {
            *hits.entry(lb.next_server(&eps).unwrap().port()).or_default() += 1;
        }
        assert_eq!(hits.len(), 3);
        assert!(hits.values().all(|&n| n == 3));
    }

    #[test]
    fn test_unhealthy_share_spreads_evenly() {
        let lb = RoundRobin::new();
        let eps = endpoints(3);
        eps[1].set_health(HealthState::Unhealthy);

        let mut hits: HashMap<u16, usize> = HashMap::new();
        for _ in 0..6 {
            *hits.entry(lb.next_server(&eps).unwrap().port()).or_default() += 1;
        }
        assert_eq!(hits.get(&8081), None);
        assert_eq!(hits[&8080], 3);
        assert_eq!(hits[&8082], 3);
    }

    #[test]
    fn test_skips_unhealthy_and_none_when_all_down() {
        let lb = RoundRobin::new();
        let eps = endpoints(3);
        eps[1].set_health(HealthState::Unhealthy);
        for _ in 0..6 {
            assert_ne!(lb.next_server(&eps).unwrap().port(), 8081);
        }

        for ep in &eps {
            ep.set_health(HealthState::Unhealthy);
        }
        assert!(lb.next_server(&eps).is_none());
        assert!(lb.next_server(&[]).is_none());
    }
}
