//! Sandbox service implementing the full service contract

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bus::InMemoryBus;
use crate::config::SandboxConfig;
use crate::engine::{UnitExecutor, UnitRequest};
use crate::scheduler::{ChangeScheduler, ForceScheduler};
use crate::store::UnitStore;
use shared::logging::{ComponentId, log_shutdown, log_startup};
use shared::{
    DataApi, EventBus, ListenerProbe, LogContent, LogId, LogRecord, Payload, Properties,
    ServiceError, ServiceLifecycle, ServiceResult, StepId, StepRecord, Subscription, TopicPath,
    TopicPattern, Trigger, TriggerControl, UnitId, UnitRecord,
};

struct Running {
    executor: mpsc::UnboundedSender<UnitRequest>,
    tasks: Vec<JoinHandle<()>>,
}

/// In-process orchestration service
///
/// `start()` returns as soon as the executor is running; change schedulers
/// attach to the bus later, after their configured subscribe delay.
pub struct SandboxService {
    config: SandboxConfig,
    bus: InMemoryBus,
    store: Arc<UnitStore>,
    change_schedulers: Vec<Arc<ChangeScheduler>>,
    force_schedulers: Vec<Arc<ForceScheduler>>,
    running: Mutex<Option<Running>>,
    started: AtomicBool,
}

impl SandboxService {
    pub fn new(config: SandboxConfig) -> ServiceResult<Self> {
        config
            .validate()
            .map_err(|reason| ServiceError::InvalidConfig {
                field: "sandbox".to_string(),
                value: reason,
            })?;
        Ok(Self::from_config(config))
    }

    /// Service with the default configuration
    pub fn with_defaults() -> Self {
        Self::from_config(SandboxConfig::default())
    }

    fn from_config(config: SandboxConfig) -> Self {
        let change_schedulers = config
            .change_schedulers
            .iter()
            .map(|s| Arc::new(ChangeScheduler::new(s.name.clone())))
            .collect();
        let force_schedulers = config
            .force_schedulers
            .iter()
            .map(|name| Arc::new(ForceScheduler::new(name.clone())))
            .collect();

        Self {
            config,
            bus: InMemoryBus::new(),
            store: Arc::new(UnitStore::new()),
            change_schedulers,
            force_schedulers,
            running: Mutex::new(None),
            started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn bus(&self) -> &InMemoryBus {
        &self.bus
    }

    pub fn store(&self) -> &UnitStore {
        &self.store
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Subscribe delay of every change scheduler, jitter included
    fn subscribe_delays(&self) -> Vec<Duration> {
        let mut rng = StdRng::seed_from_u64(self.config.jitter_seed);
        self.config
            .change_schedulers
            .iter()
            .map(|s| match self.config.subscribe_jitter {
                Some(max) if !max.is_zero() => {
                    let extra = rng.gen_range(0..=max.as_millis() as u64);
                    s.subscribe_delay + Duration::from_millis(extra)
                }
                _ => s.subscribe_delay,
            })
            .collect()
    }
}

#[async_trait]
impl ServiceLifecycle for SandboxService {
    async fn start(&self) -> ServiceResult<()> {
        let mut running = self.running.lock().await;
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServiceError::AlreadyStarted);
        }

        log_startup(ComponentId::Sandbox, "sandbox service");
        let executor = UnitExecutor::new(self.store.clone(), self.bus.clone(), &self.config);
        let (tx, executor_task) = executor.spawn();

        let mut tasks = vec![executor_task];
        for (scheduler, delay) in self.change_schedulers.iter().zip(self.subscribe_delays()) {
            debug!(scheduler = %scheduler.name(), ?delay, "Scheduling consumer attach");
            tasks.push(scheduler.clone().spawn(self.bus.clone(), tx.clone(), delay));
        }

        *running = Some(Running {
            executor: tx,
            tasks,
        });
        info!(
            change_schedulers = self.change_schedulers.len(),
            force_schedulers = self.force_schedulers.len(),
            "✅ Sandbox started"
        );
        Ok(())
    }

    async fn stop(&self) -> ServiceResult<()> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };

        log_shutdown(ComponentId::Sandbox, "stop requested");
        for task in &running.tasks {
            task.abort();
        }
        for scheduler in &self.change_schedulers {
            scheduler.detach();
        }
        self.bus.close();
        Ok(())
    }

    fn listeners(&self) -> Vec<Arc<dyn ListenerProbe>> {
        let change = self
            .change_schedulers
            .iter()
            .map(|s| s.clone() as Arc<dyn ListenerProbe>);
        let force = self
            .force_schedulers
            .iter()
            .map(|s| s.clone() as Arc<dyn ListenerProbe>);
        change.chain(force).collect()
    }
}

#[async_trait]
impl EventBus for SandboxService {
    async fn subscribe(&self, pattern: TopicPattern) -> ServiceResult<Subscription> {
        self.bus.subscribe(pattern)
    }
}

#[async_trait]
impl TriggerControl for SandboxService {
    async fn invoke_trigger(&self, trigger: &Trigger) -> ServiceResult<()> {
        let running = self.running.lock().await;
        let running = running.as_ref().ok_or(ServiceError::NotRunning)?;

        match trigger {
            Trigger::Force {
                scheduler,
                reason,
                properties,
            } => {
                if !self.force_schedulers.iter().any(|s| s.name() == *scheduler) {
                    return Err(ServiceError::UnknownScheduler {
                        name: scheduler.clone(),
                    });
                }
                let request =
                    UnitRequest::new(scheduler.clone(), reason.clone()).with_properties(properties.clone());
                running
                    .executor
                    .send(request)
                    .map_err(|_| ServiceError::NotRunning)?;
                info!(scheduler = %scheduler, "⚡ Force trigger accepted");
            }
            Trigger::Change(change) => {
                let change = self.store.add_change(change.clone());
                let Some(changeid) = change.changeid else {
                    return Err(ServiceError::TriggerRejected {
                        message: "change was not assigned an id".to_string(),
                    });
                };
                let delivered = self
                    .bus
                    .publish(TopicPath::change_new(changeid), Payload::Change(change));
                if delivered == 0 {
                    debug!(change = %changeid, "Change published with no consumer attached");
                } else {
                    info!(change = %changeid, consumers = delivered, "📨 Change published");
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DataApi for SandboxService {
    async fn get_units(&self) -> ServiceResult<Vec<UnitRecord>> {
        Ok(self.store.units())
    }

    async fn get_steps(&self, unit: UnitId) -> ServiceResult<Vec<StepRecord>> {
        self.store.steps(unit)
    }

    async fn get_logs(&self, step: StepId) -> ServiceResult<Vec<LogRecord>> {
        self.store.logs(step)
    }

    async fn get_log_content(&self, log: LogId) -> ServiceResult<LogContent> {
        self.store.log_content(log)
    }

    async fn get_properties(&self, unit: UnitId) -> ServiceResult<Properties> {
        self.store.properties(unit)
    }
}
