//! Smooth weighted round-robin.
//!
//! Each pick adds every healthy endpoint's weight to its running score,
//! takes the highest score, and subtracts the total weight from the winner.
//! Over one cycle each endpoint is chosen `weight` times, interleaved rather
//! than in bursts.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::load_balancer::{Endpoint, LoadBalancer};

#[derive(Debug, Default)]
pub struct WeightedRoundRobin {
    scores: Mutex<HashMap<String, i64>>,
}

impl WeightedRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for WeightedRoundRobin {
    fn next_server(&self, endpoints: &[Arc<Endpoint>]) -> Option<Arc<Endpoint>> {
        let mut scores = self.scores.lock();
        scores.retain(|id, _| endpoints.iter().any(|ep| ep.id() == id));

        let mut total: i64 = 0;
        let mut best: Option<(&Arc<Endpoint>, i64)> = None;
        for ep in endpoints.iter().filter(|ep| ep.is_healthy() && ep.weight() > 0) {
            let weight = i64::from(ep.weight());
            total += weight;
            let score = scores.entry(ep.id().to_string()).or_insert(0);
            *score += weight;
            if best.map_or(true, |(_, s)| *score > s) {
                best = Some((ep, *score));
            }
        }

        let (chosen, _) = best?;
        if let Some(score) = scores.get_mut(chosen.id()) {
            *score -= total;
        }
        Some(Arc::clone(chosen))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::{EndpointAddr, HealthState};

    fn ep(port: u16, weight: u32) -> Arc<Endpoint> {
        Arc::new(Endpoint::new(EndpointAddr::new("127.0.0.1", port).with_weight(weight)))
    }

    #[test]
    fn test_smooth_interleaving() {
        let lb = WeightedRoundRobin::new();
        let eps = vec![ep(1, 5), ep(2, 1), ep(3, 1)];
        let picks: Vec<u16> = (0..7).map(|_| lb.next_server(&eps).unwrap().port()).collect();
        assert_eq!(picks, [1, 1, 2, 1, 3, 1, 1]);
    }

    #[test]
    fn test_equal_weights_behave_like_round_robin() {
        let lb = WeightedRoundRobin::new();
        let eps = vec![ep(1, 1), ep(2, 1), ep(3, 1)];
        let picks: Vec<u16> = (0..6).map(|_| lb.next_server(&eps).unwrap().port()).collect();
        assert_eq!(picks, [1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_unhealthy_excluded() {
        let lb = WeightedRoundRobin::new();
        let eps = vec![ep(1, 3), ep(2, 1)];
        eps[0].set_health(HealthState::Unhealthy);
        assert!((0..4).all(|_| lb.next_server(&eps).unwrap().port() == 2));

        eps[1].set_health(HealthState::Unhealthy);
        assert!(lb.next_server(&eps).is_none());
    }
}
