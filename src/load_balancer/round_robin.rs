//! Round-robin load balancing strategy.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{destination::Destination, LoadBalancer};

/// Round-robin selector.
/// Stores an internal counter to rotate through destinations.
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
    fn select(&self, eligible: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        if eligible.is_empty() {
            return None;
        }
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % eligible.len();
        Some(eligible[index].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new();
        let d1 = testing::destination("d1");
        let d2 = testing::destination("d2");
        let destinations = vec![d1, d2];

        let names: Vec<_> = (0..3)
            .map(|_| lb.select(&destinations).unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["d1", "d2", "d1"]);
    }

    #[test]
    fn test_empty_set() {
        assert!(RoundRobin::new().select(&[]).is_none());
    }
}
