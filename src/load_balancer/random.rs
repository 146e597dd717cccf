//! Uniform random load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{destination::Destination, LoadBalancer};

#[derive(Debug, Default)]
pub struct Random;

impl LoadBalancer for Random {
    fn select(&self, eligible: &[Arc<Destination>]) -> Option<Arc<Destination>> {
        if eligible.is_empty() {
            return None;
        }
        Some(eligible[fastrand::usize(..eligible.len())].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use std::collections::HashSet;

    #[test]
    fn test_random_covers_every_destination() {
        let destinations = vec![
            testing::destination("d1"),
            testing::destination("d2"),
            testing::destination("d3"),
        ];
        let seen: HashSet<_> = (0..300)
            .map(|_| Random.select(&destinations).unwrap().name.clone())
            .collect();
        assert_eq!(seen.len(), 3);
        assert!(Random.select(&[]).is_none());
    }
}
