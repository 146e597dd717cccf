//! Middleware chain.
//!
//! A pipeline is an ordered slice of [`Middleware`] ending in an
//! [`Endpoint`]. Each middleware receives the call context and a [`Next`]
//! continuation for the rest of the chain; it may call `next` zero, one or
//! many times (hedging and retries call it repeatedly).

use std::fmt;

use futures_util::future::BoxFuture;

use crate::error::GatewayError;
use crate::pipeline::context::{CallContext, UpstreamResponse};

pub type PipelineResult = Result<UpstreamResponse, GatewayError>;

pub trait Middleware: Send + Sync + fmt::Debug {
    fn handle<'a>(&'a self, ctx: CallContext, next: Next<'a>) -> BoxFuture<'a, PipelineResult>;
}

/// The innermost stage; performs the actual call.
pub trait Endpoint: Send + Sync + fmt::Debug {
    fn call<'a>(&'a self, ctx: CallContext) -> BoxFuture<'a, PipelineResult>;
}

/// The remainder of the chain after the current middleware.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    layers: &'a [Box<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub fn new(layers: &'a [Box<dyn Middleware>], endpoint: &'a dyn Endpoint) -> Self {
        Self { layers, endpoint }
    }

    pub fn run(self, ctx: CallContext) -> BoxFuture<'a, PipelineResult> {
        match self.layers.split_first() {
            Some((layer, rest)) => layer.handle(
                ctx,
                Next {
                    layers: rest,
                    endpoint: self.endpoint,
                },
            ),
            None => self.endpoint.call(ctx),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("remaining_layers", &self.layers.len())
            .finish()
    }
}
