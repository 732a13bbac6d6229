//! Subscription handles for the event bus
//!
//! A [`Subscription`] owns the receiving end of a channel the bus publishes
//! into. Releasing it deregisters it from the bus; release is idempotent and
//! also happens on drop, so no exit path leaves a live registration behind.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::messages::{BusEvent, TopicPattern};

/// Unique identifier of a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Implemented by buses so a subscription can deregister itself
pub trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: SubscriptionId);
}

pub struct Subscription {
    id: SubscriptionId,
    pattern: TopicPattern,
    receiver: mpsc::UnboundedReceiver<BusEvent>,
    registry: Option<Arc<dyn Unsubscribe>>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        pattern: TopicPattern,
        receiver: mpsc::UnboundedReceiver<BusEvent>,
        registry: Arc<dyn Unsubscribe>,
    ) -> Self {
        Self {
            id,
            pattern,
            receiver,
            registry: Some(registry),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn pattern(&self) -> &TopicPattern {
        &self.pattern
    }

    /// Receive the next event
    ///
    /// Returns `None` once the subscription is released or the bus has shut down.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        if self.registry.is_none() {
            return None;
        }
        self.receiver.recv().await
    }

    /// Deregister from the bus. Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(registry) = self.registry.take() {
            registry.unsubscribe(self.id);
            self.receiver.close();
            tracing::trace!(subscription = %self.id, pattern = %self.pattern, "subscription released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.registry.is_none()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
