//! Correlation of a trigger with the unit it started
//!
//! The bus carries lifecycle events for every unit, including units started
//! before the trigger and units started concurrently with it. The unit that
//! belongs to a trigger is the first one to announce `started` after the
//! trigger was issued; its matching `finished` event completes the wait.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{HarnessError, HarnessResult};
use shared::{
    EventBus, ServiceResult, Subscription, TopicPattern, Trigger, TriggerControl, UnitId,
    UnitRecord,
};

/// Where a correlation currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingStart,
    AwaitingFinish(UnitId),
    Done(UnitId),
}

/// State machine matching `started` and `finished` events to one unit
///
/// `finished` events seen before any `started` are kept by unit id, so a
/// completion delivered ahead of its start on the other topic still matches.
/// Everything kept is discarded once the unit is known.
#[derive(Debug, Clone)]
pub struct Correlation {
    phase: Phase,
    early_finished: HashMap<UnitId, UnitRecord>,
}

impl Correlation {
    pub fn new() -> Self {
        Self {
            phase: Phase::AwaitingStart,
            early_finished: HashMap::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_awaiting_start(&self) -> bool {
        self.phase == Phase::AwaitingStart
    }

    /// Feed a `started` event; only the first one is latched
    ///
    /// Returns the finished record if it had already arrived.
    pub fn on_started(&mut self, unit: UnitRecord) -> Option<UnitRecord> {
        if self.phase != Phase::AwaitingStart {
            return None;
        }

        let id = unit.unitid;
        match self.early_finished.remove(&id) {
            Some(finished) => {
                self.phase = Phase::Done(id);
                self.early_finished.clear();
                Some(finished)
            }
            None => {
                self.phase = Phase::AwaitingFinish(id);
                self.early_finished.clear();
                None
            }
        }
    }

    /// Feed a `finished` event; returns it when it belongs to the latched unit
    pub fn on_finished(&mut self, unit: UnitRecord) -> Option<UnitRecord> {
        match self.phase {
            Phase::AwaitingStart => {
                self.early_finished.insert(unit.unitid, unit);
                None
            }
            Phase::AwaitingFinish(id) if unit.unitid == id => {
                self.phase = Phase::Done(id);
                Some(unit)
            }
            Phase::AwaitingFinish(_) | Phase::Done(_) => None,
        }
    }
}

impl Default for Correlation {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a trigger and waits for the completion of the unit it started
#[derive(Debug, Clone)]
pub struct EventCorrelator {
    started: TopicPattern,
    finished: TopicPattern,
    timeout: Option<Duration>,
}

impl EventCorrelator {
    pub fn new(started: TopicPattern, finished: TopicPattern) -> Self {
        Self {
            started,
            finished,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Issue `trigger` against the service and wait for its unit to finish
    pub async fn invoke<S>(&self, service: &S, trigger: &Trigger) -> HarnessResult<UnitRecord>
    where
        S: EventBus + TriggerControl + ?Sized,
    {
        self.trigger_and_wait(service, &trigger.to_string(), || {
            service.invoke_trigger(trigger)
        })
        .await
    }

    /// Subscribe, run `action`, then wait for the matching `finished` event
    ///
    /// Both subscriptions exist before `action` runs and are released on
    /// every exit path.
    pub async fn trigger_and_wait<B, F, Fut>(
        &self,
        bus: &B,
        label: &str,
        action: F,
    ) -> HarnessResult<UnitRecord>
    where
        B: EventBus + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResult<()>>,
    {
        let mut started = bus.subscribe(self.started.clone()).await?;
        let mut finished = bus.subscribe(self.finished.clone()).await?;

        debug!(trigger = %label, "🎯 Subscribed, invoking trigger");
        if let Err(source) = action().await {
            started.release();
            finished.release();
            return Err(HarnessError::TriggerFailed {
                trigger: label.to_string(),
                source,
            });
        }

        let waiting = self.await_completion(&mut started, &mut finished);
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, waiting)
                .await
                .unwrap_or(Err(HarnessError::CorrelationTimeout { timeout: limit })),
            None => waiting.await,
        };

        started.release();
        finished.release();

        if let Ok(unit) = &result {
            info!(trigger = %label, unit = %unit.unitid, "🏁 Unit correlated with trigger");
        }
        result
    }

    async fn await_completion(
        &self,
        started: &mut Subscription,
        finished: &mut Subscription,
    ) -> HarnessResult<UnitRecord> {
        let mut correlation = Correlation::new();

        loop {
            let awaiting_start = correlation.is_awaiting_start();
            tokio::select! {
                biased;
                event = started.recv(), if awaiting_start => {
                    let Some(event) = event else {
                        return Err(HarnessError::SubscriptionClosed { topic: self.started.to_string() });
                    };
                    let Some(unit) = event.into_unit() else {
                        continue;
                    };
                    let resolved = correlation.on_started(unit);
                    if let Phase::AwaitingFinish(id) | Phase::Done(id) = correlation.phase() {
                        started.release();
                        debug!(unit = %id, "Captured unit started by trigger");
                    }
                    if let Some(unit) = resolved {
                        return Ok(unit);
                    }
                }
                event = finished.recv() => {
                    let Some(event) = event else {
                        return Err(HarnessError::SubscriptionClosed { topic: self.finished.to_string() });
                    };
                    let Some(unit) = event.into_unit() else {
                        continue;
                    };
                    if let Some(unit) = correlation.on_finished(unit) {
                        return Ok(unit);
                    }
                }
            }
        }
    }
}

impl Default for EventCorrelator {
    fn default() -> Self {
        Self::new(TopicPattern::unit_started(), TopicPattern::unit_finished())
    }
}
