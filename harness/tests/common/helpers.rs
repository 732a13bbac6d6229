//! Test helper functions and service doubles

use async_trait::async_trait;
use std::sync::Arc;

use sandbox::{SandboxConfig, SandboxService};
use shared::traits::MockListenerProbe;
use shared::{
    DataApi, EventBus, ListenerProbe, LogContent, LogId, LogRecord, Properties, ServiceError,
    ServiceLifecycle, ServiceResult, StepId, StepRecord, Subscription, TopicPattern, Trigger,
    TriggerControl, UnitId, UnitRecord,
};

pub struct TestHelpers;

impl TestHelpers {
    pub fn init_tracing() {
        shared::logging::init_test_tracing();
    }

    pub fn sandbox(config: SandboxConfig) -> Arc<SandboxService> {
        Arc::new(SandboxService::new(config).expect("valid sandbox config"))
    }

    pub fn default_sandbox() -> Arc<SandboxService> {
        Arc::new(SandboxService::with_defaults())
    }

    /// A consuming listener whose probe always errors
    pub fn broken_probe(name: &'static str) -> Arc<dyn ListenerProbe> {
        let mut probe = MockListenerProbe::new();
        probe.expect_name().return_const(name.to_string());
        probe.expect_consumes_events().return_const(true);
        probe.expect_is_consuming().returning(move || {
            Err(ServiceError::ProbeFailed {
                listener: name.to_string(),
                message: "listener table unavailable".into(),
            })
        });
        Arc::new(probe)
    }
}

/// Sandbox wrapper reporting a listener that cannot be probed
pub struct ProbeFailingService {
    pub inner: Arc<SandboxService>,
}

impl ProbeFailingService {
    pub fn new(inner: Arc<SandboxService>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ServiceLifecycle for ProbeFailingService {
    async fn start(&self) -> ServiceResult<()> {
        self.inner.start().await
    }

    async fn stop(&self) -> ServiceResult<()> {
        self.inner.stop().await
    }

    fn listeners(&self) -> Vec<Arc<dyn ListenerProbe>> {
        vec![TestHelpers::broken_probe("broken-consumer")]
    }
}

#[async_trait]
impl EventBus for ProbeFailingService {
    async fn subscribe(&self, pattern: TopicPattern) -> ServiceResult<Subscription> {
        self.inner.subscribe(pattern).await
    }
}

#[async_trait]
impl TriggerControl for ProbeFailingService {
    async fn invoke_trigger(&self, trigger: &Trigger) -> ServiceResult<()> {
        self.inner.invoke_trigger(trigger).await
    }
}

#[async_trait]
impl DataApi for ProbeFailingService {
    async fn get_units(&self) -> ServiceResult<Vec<UnitRecord>> {
        self.inner.get_units().await
    }

    async fn get_steps(&self, unit: UnitId) -> ServiceResult<Vec<StepRecord>> {
        self.inner.get_steps(unit).await
    }

    async fn get_logs(&self, step: StepId) -> ServiceResult<Vec<LogRecord>> {
        self.inner.get_logs(step).await
    }

    async fn get_log_content(&self, log: LogId) -> ServiceResult<LogContent> {
        self.inner.get_log_content(log).await
    }

    async fn get_properties(&self, unit: UnitId) -> ServiceResult<Properties> {
        self.inner.get_properties(unit).await
    }
}
