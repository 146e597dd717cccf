//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → cluster identified
//!     → pool.rs (filter destinations down to the eligible ones)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through destinations)
//!         - random.rs (uniform random pick)
//!     → destination.rs (selected endpoint + its health)
//! ```
//!
//! # Design Decisions
//! - Algorithms only ever see eligible destinations
//! - Algorithm selection is global (`load_balancing.strategy`)
//! - Destinations are created once from configuration and never removed

use std::fmt::Debug;
use std::sync::Arc;

use crate::config::LoadBalancingStrategy;
use crate::load_balancer::destination::Destination;

pub mod destination;
pub mod pool;
pub mod random;
pub mod round_robin;

/// Picks one destination out of the eligible set.
pub trait LoadBalancer: Send + Sync + Debug {
    fn select(&self, eligible: &[Arc<Destination>]) -> Option<Arc<Destination>>;
}

/// Build the configured algorithm.
pub fn from_strategy(strategy: LoadBalancingStrategy) -> Box<dyn LoadBalancer> {
    match strategy {
        LoadBalancingStrategy::RoundRobin => Box::new(round_robin::RoundRobin::new()),
        LoadBalancingStrategy::Random => Box::new(random::Random),
    }
}
