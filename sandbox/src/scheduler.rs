//! Schedulers that turn stimuli into unit requests

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::InMemoryBus;
use crate::engine::UnitRequest;
use shared::{ListenerProbe, ServiceResult, TopicPattern};

/// Scheduler that starts a unit for every change event it consumes
///
/// It attaches its consumer only after a delay once spawned, so a change
/// submitted right after the service starts is not seen by it.
pub struct ChangeScheduler {
    name: String,
    consuming: AtomicBool,
}

impl ChangeScheduler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            consuming: AtomicBool::new(false),
        }
    }

    /// Subscribe to change events after `delay` and forward each change
    /// to the executor until the bus or the executor goes away
    pub fn spawn(
        self: Arc<Self>,
        bus: InMemoryBus,
        executor: mpsc::UnboundedSender<UnitRequest>,
        delay: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut subscription = match bus.subscribe(TopicPattern::change_new()) {
                Ok(subscription) => subscription,
                Err(e) => {
                    warn!(scheduler = %self.name, error = %e, "Scheduler could not subscribe");
                    return;
                }
            };
            self.consuming.store(true, Ordering::SeqCst);
            info!(scheduler = %self.name, "👂 Scheduler consuming changes after {:?}", delay);

            while let Some(event) = subscription.recv().await {
                let Some(change) = event.change() else {
                    continue;
                };
                debug!(scheduler = %self.name, topic = %event.topic, "Change received");
                if executor
                    .send(UnitRequest::from_change(&self.name, change))
                    .is_err()
                {
                    break;
                }
            }

            subscription.release();
            self.consuming.store(false, Ordering::SeqCst);
        })
    }

    /// Mark the consumer as detached; used when its task is aborted
    pub fn detach(&self) {
        self.consuming.store(false, Ordering::SeqCst);
    }
}

impl ListenerProbe for ChangeScheduler {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn consumes_events(&self) -> bool {
        true
    }

    fn is_consuming(&self) -> ServiceResult<bool> {
        Ok(self.consuming.load(Ordering::SeqCst))
    }
}

/// Scheduler invoked directly; never consumes events
pub struct ForceScheduler {
    name: String,
}

impl ForceScheduler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ListenerProbe for ForceScheduler {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn consumes_events(&self) -> bool {
        false
    }

    fn is_consuming(&self) -> ServiceResult<bool> {
        Ok(false)
    }
}
