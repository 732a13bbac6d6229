//! Sequential unit executor
//!
//! Units are executed one at a time in request order. Each unit walks the
//! configured step script, records steps and logs in the store, and announces
//! its lifecycle on `units.<id>.started` and `units.<id>.finished`.

use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::InMemoryBus;
use crate::config::{SandboxConfig, StepScript};
use crate::store::UnitStore;
use shared::{ChangeRecord, Payload, PropertyValue, ResultCode, TopicPath, UnitId, UnitRecord};

/// Request to run one unit of work
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRequest {
    pub scheduler: String,
    pub reason: String,
    pub properties: BTreeMap<String, Value>,
}

impl UnitRequest {
    pub fn new(scheduler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            scheduler: scheduler.into(),
            reason: reason.into(),
            properties: BTreeMap::new(),
        }
    }

    /// Request raised by a scheduler reacting to a change
    pub fn from_change(scheduler: &str, change: &ChangeRecord) -> Self {
        let mut request = Self::new(scheduler, format!("change by {}", change.author));
        if let Some(branch) = &change.branch {
            request
                .properties
                .insert("branch".to_string(), Value::String(branch.clone()));
        }
        if let Some(revision) = &change.revision {
            request
                .properties
                .insert("revision".to_string(), Value::String(revision.clone()));
        }
        request
    }

    pub fn with_properties(mut self, properties: BTreeMap<String, Value>) -> Self {
        self.properties.extend(properties);
        self
    }
}

pub struct UnitExecutor {
    store: Arc<UnitStore>,
    bus: InMemoryBus,
    steps: Vec<StepScript>,
    step_delay: Duration,
    next_id: u64,
}

impl UnitExecutor {
    pub fn new(store: Arc<UnitStore>, bus: InMemoryBus, config: &SandboxConfig) -> Self {
        Self {
            store,
            bus,
            steps: config.steps.clone(),
            step_delay: config.step_delay,
            next_id: config.first_unit_id,
        }
    }

    /// Run the executor on its own task, fed by the returned sender
    pub fn spawn(mut self) -> (mpsc::UnboundedSender<UnitRequest>, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<UnitRequest>();
        let handle = tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                self.execute(request).await;
            }
            debug!("🏗️ Unit executor stopped");
        });
        (tx, handle)
    }

    /// Execute a single unit to completion and return its final record
    pub async fn execute(&mut self, request: UnitRequest) -> UnitRecord {
        let unitid = UnitId(self.next_id);
        self.next_id += 1;

        let unit = UnitRecord {
            unitid,
            number: unitid.0,
            scheduler: request.scheduler.clone(),
            state_string: "started".to_string(),
            results: None,
            started_at: Utc::now(),
            complete_at: None,
        };
        self.store.insert_unit(unit.clone());
        self.record_properties(unitid, &request);

        info!(unit = %unitid, scheduler = %request.scheduler, "🏗️ Unit started: {}", request.reason);
        self.bus
            .publish(TopicPath::unit_started(unitid), Payload::Unit(unit.clone()));

        let mut results = ResultCode::Success;
        for script in &self.steps {
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            results = results.worst(self.run_step(unitid, script));
        }

        let complete = |unit: &mut UnitRecord| {
            unit.results = Some(results);
            unit.state_string = "finished".to_string();
            unit.complete_at = Some(Utc::now());
        };
        let finished = self.store.update_unit(unitid, complete).unwrap_or_else(|| {
            warn!(unit = %unitid, "Unit missing from store at completion");
            let mut unit = unit.clone();
            complete(&mut unit);
            unit
        });

        info!(unit = %unitid, results = %results, "🏁 Unit finished");
        self.bus.publish(
            TopicPath::unit_finished(unitid),
            Payload::Unit(finished.clone()),
        );
        finished
    }

    fn run_step(&self, unitid: UnitId, script: &StepScript) -> ResultCode {
        let step = self.store.add_step(unitid, &script.name);
        for log in &script.logs {
            if let Err(e) = self
                .store
                .add_log(step.stepid, &log.name, log.log_type, &log.content)
            {
                warn!(step = %step.stepid, error = %e, "Failed to attach log");
            }
        }
        if let Err(e) = self
            .store
            .finish_step(step.stepid, script.results, script.urls.clone())
        {
            warn!(step = %step.stepid, error = %e, "Failed to finish step");
        }
        debug!(unit = %unitid, step = %script.name, results = %script.results, "Step finished");
        script.results
    }

    fn record_properties(&self, unitid: UnitId, request: &UnitRequest) {
        self.store.set_property(
            unitid,
            "scheduler",
            PropertyValue::new(request.scheduler.clone(), "Scheduler"),
        );
        self.store.set_property(
            unitid,
            "reason",
            PropertyValue::new(request.reason.clone(), "Scheduler"),
        );
        for (name, value) in &request.properties {
            self.store.set_property(
                unitid,
                name.clone(),
                PropertyValue::new(value.clone(), request.scheduler.clone()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogScript;
    use shared::TopicPattern;

    fn executor(config: &SandboxConfig) -> (UnitExecutor, Arc<UnitStore>, InMemoryBus) {
        let store = Arc::new(UnitStore::new());
        let bus = InMemoryBus::new();
        (UnitExecutor::new(store.clone(), bus.clone(), config), store, bus)
    }

    #[tokio::test]
    async fn test_unit_ids_start_at_configured_value() {
        let config = SandboxConfig::builder().first_unit_id(7).build();
        let (mut executor, store, _bus) = executor(&config);

        let first = executor.execute(UnitRequest::new("force", "test")).await;
        let second = executor.execute(UnitRequest::new("force", "test")).await;

        assert_eq!(first.unitid, UnitId(7));
        assert_eq!(second.unitid, UnitId(8));
        assert_eq!(store.units().len(), 2);
    }

    #[tokio::test]
    async fn test_result_is_worst_step_result() {
        let config = SandboxConfig::builder()
            .steps(vec![
                StepScript::new("ok", ResultCode::Success),
                StepScript::new("broken", ResultCode::Failure)
                    .with_log(LogScript::stdio("stdio", "hrun\neboom\n")),
                StepScript::new("warn", ResultCode::Warnings),
            ])
            .build();
        let (mut executor, store, _bus) = executor(&config);

        let unit = executor.execute(UnitRequest::new("force", "test")).await;

        assert_eq!(unit.results, Some(ResultCode::Failure));
        assert!(unit.is_complete());
        assert_eq!(store.steps(unit.unitid).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_started_then_finished_published() {
        let config = SandboxConfig::default();
        let (mut executor, _store, bus) = executor(&config);
        let mut started = bus.subscribe(TopicPattern::unit_started()).unwrap();
        let mut finished = bus.subscribe(TopicPattern::unit_finished()).unwrap();

        let unit = executor.execute(UnitRequest::new("force", "test")).await;

        let start = started.recv().await.unwrap();
        assert_eq!(start.topic, TopicPath::unit_started(unit.unitid));
        assert_eq!(start.unit().unwrap().results, None);
        let finish = finished.recv().await.unwrap();
        assert_eq!(finish.into_unit().unwrap(), unit);
    }

    #[test]
    fn test_request_from_change_carries_branch() {
        let change = ChangeRecord::new("alice", "fix").with_branch("main");
        let request = UnitRequest::from_change("change-consumer", &change);
        assert_eq!(request.reason, "change by alice");
        assert_eq!(request.properties["branch"], Value::String("main".into()));
    }
}
