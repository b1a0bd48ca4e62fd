//! Subscriber handler abstraction.
//!
//! A [`StimulusHandler`] receives events for one agent. Any async closure
//! of the shape `Fn(StimulusEvent) -> impl Future<Output = Result<(), HandlerError>>`
//! is a handler, and [`ChannelHandler`] forwards events into a tokio channel.

use std::future::Future;

use async_trait::async_trait;
use seedbed_types::StimulusEvent;
use tokio::sync::mpsc;

use crate::error::HandlerError;

/// Receives stimulus events delivered to one subscriber.
#[async_trait]
pub trait StimulusHandler: Send + Sync {
    /// Process one event.
    ///
    /// Errors and panics are contained by the router and never affect
    /// delivery to other subscribers.
    async fn handle(&self, event: &StimulusEvent) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> StimulusHandler for F
where
    F: Fn(StimulusEvent) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, event: &StimulusEvent) -> Result<(), HandlerError> {
        (self)(event.clone()).await
    }
}

/// Handler that forwards every event into a bounded tokio channel.
///
/// Uses `try_send`, so a full or closed channel is reported as a
/// delivery failure instead of stalling the fan-out.
#[derive(Debug, Clone)]
pub struct ChannelHandler {
    tx: mpsc::Sender<StimulusEvent>,
}

impl ChannelHandler {
    /// Wrap an existing sender.
    pub const fn new(tx: mpsc::Sender<StimulusEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl StimulusHandler for ChannelHandler {
    async fn handle(&self, event: &StimulusEvent) -> Result<(), HandlerError> {
        self.tx
            .try_send(event.clone())
            .map_err(|e| HandlerError::Channel(e.to_string()))
    }
}
