//! In-memory topic bus
//!
//! Subscribers are kept in registration order; every published event is
//! fanned out to each subscriber whose pattern matches the topic, in the
//! order `publish` is called.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use shared::{
    BusEvent, EventBus, Payload, ServiceError, ServiceResult, Subscription, SubscriptionId, TopicPath,
    TopicPattern, Unsubscribe,
};

struct Subscriber {
    id: SubscriptionId,
    pattern: TopicPattern,
    sender: mpsc::UnboundedSender<BusEvent>,
}

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<Vec<Subscriber>>,
    closed: AtomicBool,
}

impl BusInner {
    fn subscribers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Unsubscribe for BusInner {
    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers().retain(|s| s.id != id);
    }
}

/// Cloneable handle to a shared bus
#[derive(Clone, Default)]
pub struct InMemoryBus {
    inner: Arc<BusInner>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, pattern: TopicPattern) -> ServiceResult<Subscription> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        {
            // close() flips `closed` while holding this lock
            let mut subscribers = self.inner.subscribers();
            if self.inner.closed.load(Ordering::SeqCst) {
                return Err(ServiceError::BusClosed);
            }
            subscribers.push(Subscriber {
                id,
                pattern: pattern.clone(),
                sender,
            });
        }
        debug!(subscription = %id, pattern = %pattern, "📡 Subscribed");

        let registry: Arc<dyn Unsubscribe> = self.inner.clone();
        Ok(Subscription::new(id, pattern, receiver, registry))
    }

    /// Publish an event and return how many subscribers received it
    pub fn publish(&self, topic: TopicPath, payload: Payload) -> usize {
        if self.inner.closed.load(Ordering::SeqCst) {
            return 0;
        }

        let event = BusEvent::new(topic, payload);
        let mut subscribers = self.inner.subscribers();
        let mut delivered = 0;
        subscribers.retain(|subscriber| {
            if !subscriber.pattern.matches(&event.topic) {
                return true;
            }
            match subscriber.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                // Receiver gone without releasing; drop the registration
                Err(_) => false,
            }
        });
        trace!(topic = %event.topic, delivered, "event published");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers().len()
    }

    /// Close the bus. Outstanding subscriptions see end-of-stream.
    pub fn close(&self) {
        let mut subscribers = self.inner.subscribers();
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            subscribers.clear();
            debug!("📡 Bus closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    async fn subscribe(&self, pattern: TopicPattern) -> ServiceResult<Subscription> {
        InMemoryBus::subscribe(self, pattern)
    }
}
