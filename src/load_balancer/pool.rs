//! Destination pool management.
//!
//! # Responsibilities
//! - Group destinations into clusters by name
//! - Apply the load balancing algorithm to the eligible destinations
//! - Own the per-cluster circuit breaker shared by every request to it

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::load_balancer::{destination::Destination, from_strategy, LoadBalancer};
use crate::pipeline::events::EventBus;
use crate::resilience::circuit_breaker::CircuitBreaker;

/// Destinations of one cluster plus the algorithm picking among them.
#[derive(Debug)]
pub struct DestinationPool {
    destinations: Vec<Arc<Destination>>,
    balancer: Box<dyn LoadBalancer>,
}

impl DestinationPool {
    pub fn new(destinations: Vec<Arc<Destination>>, balancer: Box<dyn LoadBalancer>) -> Self {
        Self { destinations, balancer }
    }

    pub fn destinations(&self) -> &[Arc<Destination>] {
        &self.destinations
    }

    pub fn eligible(&self) -> Vec<Arc<Destination>> {
        self.destinations
            .iter()
            .filter(|d| d.is_eligible())
            .cloned()
            .collect()
    }

    pub fn has_eligible(&self) -> bool {
        self.destinations.iter().any(|d| d.is_eligible())
    }

    /// Select an eligible destination, if there is one.
    pub fn select(&self) -> Option<Arc<Destination>> {
        self.balancer.select(&self.eligible())
    }
}

/// A named group of interchangeable destinations.
#[derive(Debug)]
pub struct Cluster {
    pub name: String,
    pub pool: DestinationPool,
    pub breaker: Arc<CircuitBreaker>,
}

/// Registry of every cluster, built once from configuration.
#[derive(Debug, Default)]
pub struct ClusterManager {
    clusters: BTreeMap<String, Arc<Cluster>>,
}

impl ClusterManager {
    pub fn from_config(config: &GatewayConfig, events: &EventBus) -> Result<Self, url::ParseError> {
        let mut grouped: BTreeMap<String, Vec<Arc<Destination>>> = BTreeMap::new();
        for destination in &config.destinations {
            let destination = Destination::new(
                destination,
                &config.health_check,
                &config.passive_health,
                events.clone(),
            )?;
            grouped
                .entry(destination.cluster.clone())
                .or_default()
                .push(Arc::new(destination));
        }

        let clusters = grouped
            .into_iter()
            .map(|(name, destinations)| {
                let cluster = Cluster {
                    pool: DestinationPool::new(destinations, from_strategy(config.load_balancing.strategy)),
                    breaker: Arc::new(CircuitBreaker::new(&name, &config.circuit_breaker, events.clone())),
                    name: name.clone(),
                };
                (name, Arc::new(cluster))
            })
            .collect();

        Ok(Self { clusters })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Cluster>> {
        self.clusters.get(name).cloned()
    }

    pub fn clusters(&self) -> impl Iterator<Item = &Arc<Cluster>> {
        self.clusters.values()
    }

    /// Every destination of every cluster (for health probing).
    pub fn all_destinations(&self) -> Vec<Arc<Destination>> {
        self.clusters
            .values()
            .flat_map(|c| c.pool.destinations().iter())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, LoadBalancingStrategy};

    const CONFIG: &str = r#"
[[routes]]
name = "api"
path_prefix = "/api"
cluster = "api"

[[destinations]]
name = "a1"
cluster = "api"
address = "http://127.0.0.1:5001"

[[destinations]]
name = "a2"
cluster = "api"
address = "http://127.0.0.1:5002"

[[destinations]]
name = "b1"
cluster = "batch"
address = "http://127.0.0.1:6001"
"#;

    #[test]
    fn test_groups_destinations_by_cluster() {
        let config = parse_config(CONFIG).unwrap();
        let manager = ClusterManager::from_config(&config, &EventBus::default()).unwrap();

        let api = manager.get("api").unwrap();
        assert_eq!(api.pool.destinations().len(), 2);
        assert_eq!(api.breaker.cluster(), "api");
        assert_eq!(manager.get("batch").unwrap().pool.destinations().len(), 1);
        assert!(manager.get("missing").is_none());
        assert_eq!(manager.all_destinations().len(), 3);
        assert_eq!(manager.clusters().count(), 2);
    }

    #[test]
    fn test_select_skips_ineligible() {
        let mut config = parse_config(CONFIG).unwrap();
        config.load_balancing.strategy = LoadBalancingStrategy::RoundRobin;
        config.health_check.unhealthy_threshold = 1;
        let manager = ClusterManager::from_config(&config, &EventBus::default()).unwrap();
        let api = manager.get("api").unwrap();

        api.pool.destinations()[0].record_probe(false);
        for _ in 0..4 {
            assert_eq!(api.pool.select().unwrap().name, "a2");
        }

        api.pool.destinations()[1].record_probe(false);
        assert!(!api.pool.has_eligible());
        assert!(api.pool.select().is_none());
    }
}
