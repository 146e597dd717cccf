//! Pipeline assembly and execution.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::http::forwarder::Forwarder;
use crate::load_balancer::pool::Cluster;
use crate::pipeline::context::{CallContext, RequestContext};
use crate::pipeline::events::EventBus;
use crate::pipeline::layers::{
    AdmissionLayer, CircuitBreakerLayer, DeadlineLayer, DestinationGate, ForwardStage, HedgingLayer,
    RetryLayer,
};
use crate::pipeline::middleware::{Endpoint, Middleware, Next, PipelineResult};
use crate::resilience::admission::AdmissionLimiter;
use crate::resilience::hedging::HedgingPolicy;
use crate::resilience::retries::RetryPolicy;

/// An ordered middleware chain ending in an endpoint.
///
/// One pipeline serves every request; per-request state lives in the
/// [`CallContext`] each execution creates.
#[derive(Debug)]
pub struct Pipeline {
    layers: Vec<Box<dyn Middleware>>,
    endpoint: Box<dyn Endpoint>,
    events: EventBus,
    admission: Arc<AdmissionLimiter>,
}

impl Pipeline {
    /// The gateway's pipeline:
    /// admission → deadline → destination gate → hedging → retry → circuit breaker → forward.
    pub fn standard(config: &GatewayConfig, forwarder: Arc<dyn Forwarder>, events: EventBus) -> Self {
        let admission = Arc::new(AdmissionLimiter::from_config(&config.admission));
        let idempotency_header = config.hedging.idempotency_header.clone();

        let layers: Vec<Box<dyn Middleware>> = vec![
            Box::new(AdmissionLayer::new(admission.clone(), config.admission.queue_timeout())),
            Box::new(DeadlineLayer::new(config.timeouts.overall())),
            Box::new(DestinationGate),
            Box::new(HedgingLayer::new(
                HedgingPolicy::from_config(&config.hedging),
                idempotency_header.clone(),
            )),
            Box::new(RetryLayer::new(
                RetryPolicy::from_config(&config.retries),
                idempotency_header,
            )),
            Box::new(CircuitBreakerLayer),
        ];

        Self {
            layers,
            endpoint: Box::new(ForwardStage::new(forwarder)),
            events,
            admission,
        }
    }

    /// Run one inbound request through the chain against `cluster`.
    pub async fn execute(&self, cluster: Arc<Cluster>, request: Arc<RequestContext>) -> PipelineResult {
        let ctx = CallContext::new(request, cluster, self.events.clone());
        Next::new(&self.layers, self.endpoint.as_ref()).run(ctx).await
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn admission(&self) -> &AdmissionLimiter {
        &self.admission
    }
}
