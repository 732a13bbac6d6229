//! Readiness barrier and the convergence poller behind it
//!
//! The service gives no signal once its listeners have attached to the bus,
//! so readiness is observed by polling. A [`ConvergencePoller`] owns a set of
//! named predicates and re-evaluates the pending ones on a fixed interval,
//! the first evaluation happening immediately. Each predicate is dropped from
//! the pending set the first time it holds, and the wait resolves once the
//! set is empty. The poll task is always cancelled before `wait` returns.

use futures_util::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::error::{HarnessError, HarnessResult};
use shared::{ListenerProbe, ServiceResult};

type Predicate = Box<dyn Fn() -> ServiceResult<bool> + Send + Sync>;

/// A named, fallible readiness predicate
pub struct WatchedCondition {
    name: String,
    predicate: Predicate,
}

impl WatchedCondition {
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn() -> ServiceResult<bool> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Box::new(predicate),
        }
    }

    /// Holds once the listener reports that it consumes its event source
    pub fn from_listener(listener: Arc<dyn ListenerProbe>) -> Self {
        let name = listener.name();
        Self::new(name, move || listener.is_consuming())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluate(&self) -> ServiceResult<bool> {
        (self.predicate)()
    }
}

impl std::fmt::Debug for WatchedCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchedCondition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Outcome of a completed wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// Number of poll ticks that ran
    pub ticks: u64,
    /// Whether a poll task was started at all
    pub polled: bool,
    /// Each condition with the tick on which it was first observed true
    pub satisfied: Vec<(String, u64)>,
}

impl ConvergenceReport {
    fn immediate() -> Self {
        Self {
            ticks: 0,
            polled: false,
            satisfied: Vec::new(),
        }
    }
}

/// Handle to the running poll task
///
/// Cancelling aborts the task; it is idempotent and also happens on drop.
pub struct PollTimer {
    handle: Option<JoinHandle<()>>,
}

impl PollTimer {
    fn new(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            trace!("poll timer cancelled");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Polls a set of conditions until every one of them has held once
pub struct ConvergencePoller {
    interval: Duration,
    timeout: Option<Duration>,
    conditions: Vec<WatchedCondition>,
}

impl ConvergencePoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
            conditions: Vec::new(),
        }
    }

    pub fn with_condition(mut self, condition: WatchedCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_conditions<I>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = WatchedCondition>,
    {
        self.conditions.extend(conditions);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Names of the conditions that will be waited for
    pub fn pending(&self) -> Vec<String> {
        self.conditions.iter().map(|c| c.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Wait until every condition has been observed true
    ///
    /// Resolves without polling when there is nothing to wait for. A
    /// predicate error aborts the wait; so does the optional timeout.
    pub async fn wait(self) -> HarnessResult<ConvergenceReport> {
        if self.interval.is_zero() {
            return Err(HarnessError::InvalidConfig {
                field: "poll_interval".to_string(),
                value: format!("{:?}", self.interval),
            });
        }
        if self.conditions.is_empty() {
            debug!("No conditions to wait for");
            return Ok(ConvergenceReport::immediate());
        }

        let names = self.pending();
        let ticks = Arc::new(AtomicU64::new(0));
        let mut receivers = Vec::with_capacity(self.conditions.len());
        let mut pending = Vec::with_capacity(self.conditions.len());
        for condition in self.conditions {
            let (done, rx) = oneshot::channel::<u64>();
            pending.push((condition, done));
            receivers.push(rx);
        }
        let (failure_tx, mut failure_rx) = oneshot::channel::<HarnessError>();

        let tick_counter = ticks.clone();
        let interval = self.interval;
        let mut timer = PollTimer::new(tokio::spawn(async move {
            let mut clock = tokio::time::interval(interval);
            clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while !pending.is_empty() {
                clock.tick().await;
                let tick = tick_counter.fetch_add(1, Ordering::SeqCst) + 1;

                let mut still_pending = Vec::with_capacity(pending.len());
                for (condition, done) in pending.drain(..) {
                    match condition.evaluate() {
                        Ok(true) => {
                            debug!(condition = %condition.name, tick, "Condition satisfied");
                            let _ = done.send(tick);
                        }
                        Ok(false) => still_pending.push((condition, done)),
                        Err(source) => {
                            let _ = failure_tx.send(HarnessError::ReadinessProbe {
                                listener: condition.name,
                                source,
                            });
                            return;
                        }
                    }
                }
                pending = still_pending;
                trace!(tick, pending = pending.len(), "poll tick");
            }
        }));

        let outcome = {
            let waiting = async {
                tokio::select! {
                    biased;
                    Ok(err) = &mut failure_rx => Err(err),
                    results = join_all(receivers.iter_mut()) => Ok(results),
                }
            };
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, waiting).await.ok(),
                None => Some(waiting.await),
            }
        };

        let result = match outcome {
            Some(Ok(results)) => names
                .into_iter()
                .zip(results)
                .map(|(name, tick)| {
                    tick.map(|tick| (name, tick))
                        .map_err(|_| HarnessError::PollerStopped)
                })
                .collect::<HarnessResult<Vec<_>>>()
                .map(|satisfied| ConvergenceReport {
                    ticks: ticks.load(Ordering::SeqCst),
                    polled: true,
                    satisfied,
                }),
            Some(Err(err)) => Err(err),
            None => {
                let pending = names
                    .into_iter()
                    .zip(receivers.iter_mut())
                    .filter_map(|(name, rx)| {
                        matches!(rx.try_recv(), Err(TryRecvError::Empty)).then_some(name)
                    })
                    .collect();
                Err(HarnessError::ReadinessTimeout { pending })
            }
        };

        timer.cancel();
        result
    }
}

/// Waits until every event-consuming listener has attached to the bus
pub struct ReadinessBarrier {
    poller: ConvergencePoller,
}

impl ReadinessBarrier {
    /// Snapshot the listeners that consume events but are not yet consuming
    pub fn from_listeners(
        listeners: Vec<Arc<dyn ListenerProbe>>,
        interval: Duration,
    ) -> HarnessResult<Self> {
        let mut poller = ConvergencePoller::new(interval);
        for listener in listeners {
            if !listener.consumes_events() {
                continue;
            }
            let consuming = listener
                .is_consuming()
                .map_err(|source| HarnessError::ReadinessProbe {
                    listener: listener.name(),
                    source,
                })?;
            if !consuming {
                poller = poller.with_condition(WatchedCondition::from_listener(listener));
            }
        }
        Ok(Self { poller })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.poller = self.poller.with_timeout(timeout);
        self
    }

    pub fn pending(&self) -> Vec<String> {
        self.poller.pending()
    }

    pub async fn wait(self) -> HarnessResult<ConvergenceReport> {
        let pending = self.poller.pending();
        if !pending.is_empty() {
            info!("⏳ Waiting for {} listener(s): {}", pending.len(), pending.join(", "));
        }
        let report = self.poller.wait().await?;
        if report.polled {
            info!("✅ All listeners consuming after {} tick(s)", report.ticks);
        }
        Ok(report)
    }
}
