//! Service contract with mockall annotations for testing
//!
//! These traits describe everything the harness needs from the service under
//! test. The harness only ever talks to the service through them, which keeps
//! it independent of the transport and lets tests substitute mocks.

use async_trait::async_trait;
use std::sync::Arc;

use crate::bus::Subscription;
use crate::errors::ServiceResult;
use crate::messages::{TopicPattern, Trigger};
use crate::types::{LogContent, LogRecord, Properties, StepId, StepRecord, UnitId, UnitRecord, LogId};

/// Introspection of an internal listener (e.g. a change-consuming scheduler)
#[mockall::automock]
pub trait ListenerProbe: Send + Sync {
    /// Name used in logs and readiness reports
    fn name(&self) -> String;

    /// Whether this listener is expected to subscribe to an event source at all
    fn consumes_events(&self) -> bool;

    /// Whether the listener has attached its consumer yet
    fn is_consuming(&self) -> ServiceResult<bool>;
}

/// Start/stop entry points and listener enumeration
#[mockall::automock]
#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    /// Start the service. Returns before internal listeners have subscribed.
    async fn start(&self) -> ServiceResult<()>;

    /// Stop the service and release its workers. Idempotent.
    async fn stop(&self) -> ServiceResult<()>;

    /// Snapshot of the service's current listeners
    fn listeners(&self) -> Vec<Arc<dyn ListenerProbe>>;
}

/// Publish/subscribe access to the service's event bus
#[mockall::automock]
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Register a subscription; events matching `pattern` are delivered to it
    /// in the order the bus emits them
    async fn subscribe(&self, pattern: TopicPattern) -> ServiceResult<Subscription>;
}

/// Initiation of units of work
#[mockall::automock]
#[async_trait]
pub trait TriggerControl: Send + Sync {
    async fn invoke_trigger(&self, trigger: &Trigger) -> ServiceResult<()>;
}

/// Hierarchical read API
///
/// Collections are returned in the service's own order.
#[mockall::automock]
#[async_trait]
pub trait DataApi: Send + Sync {
    /// `units`
    async fn get_units(&self) -> ServiceResult<Vec<UnitRecord>>;

    /// `units/<id>/steps`
    async fn get_steps(&self, unit: UnitId) -> ServiceResult<Vec<StepRecord>>;

    /// `steps/<id>/logs`
    async fn get_logs(&self, step: StepId) -> ServiceResult<Vec<LogRecord>>;

    /// `logs/<id>/content`
    async fn get_log_content(&self, log: LogId) -> ServiceResult<LogContent>;

    /// `units/<id>/properties`
    async fn get_properties(&self, unit: UnitId) -> ServiceResult<Properties>;
}

/// Everything the harness drives
pub trait ServiceUnderTest:
    ServiceLifecycle + EventBus + TriggerControl + DataApi + 'static
{
}

impl<T> ServiceUnderTest for T where
    T: ServiceLifecycle + EventBus + TriggerControl + DataApi + 'static
{
}
