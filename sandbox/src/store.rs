//! In-memory record store backing the read API

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use shared::{
    ChangeId, ChangeRecord, LogContent, LogId, LogRecord, LogType, Properties, PropertyValue,
    ResourcePath, ResultCode, ServiceError, ServiceResult, StepId, StepRecord, StepUrl, UnitId,
    UnitRecord,
};

#[derive(Default)]
struct StoreInner {
    units: BTreeMap<UnitId, UnitRecord>,
    steps: BTreeMap<StepId, StepRecord>,
    logs: BTreeMap<LogId, LogRecord>,
    contents: BTreeMap<LogId, LogContent>,
    properties: BTreeMap<UnitId, Properties>,
    changes: BTreeMap<ChangeId, ChangeRecord>,
    next_step: u64,
    next_log: u64,
    next_change: u64,
}

/// Records of every unit, step, log and change the sandbox produced
///
/// Identifiers are allocated in creation order, so iterating the maps yields
/// records in the order they were created.
#[derive(Default)]
pub struct UnitStore {
    inner: Mutex<StoreInner>,
}

fn not_found(path: ResourcePath) -> ServiceError {
    ServiceError::NotFound {
        path: path.to_string(),
    }
}

impl UnitStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_unit(&self, unit: UnitRecord) {
        self.lock().units.insert(unit.unitid, unit);
    }

    /// Apply `update` to a stored unit and return the updated copy
    pub fn update_unit<F>(&self, id: UnitId, update: F) -> Option<UnitRecord>
    where
        F: FnOnce(&mut UnitRecord),
    {
        let mut inner = self.lock();
        let unit = inner.units.get_mut(&id)?;
        update(unit);
        Some(unit.clone())
    }

    pub fn unit(&self, id: UnitId) -> Option<UnitRecord> {
        self.lock().units.get(&id).cloned()
    }

    pub fn units(&self) -> Vec<UnitRecord> {
        self.lock().units.values().cloned().collect()
    }

    /// Create a running step at the end of the unit's step list
    pub fn add_step(&self, unit: UnitId, name: &str) -> StepRecord {
        let mut inner = self.lock();
        inner.next_step += 1;
        let number = inner.steps.values().filter(|s| s.unitid == unit).count() as u32;
        let step = StepRecord {
            stepid: StepId(inner.next_step),
            unitid: unit,
            number,
            name: name.to_string(),
            state_string: "running".to_string(),
            results: None,
            urls: Vec::new(),
        };
        inner.steps.insert(step.stepid, step.clone());
        step
    }

    pub fn finish_step(
        &self,
        step: StepId,
        results: ResultCode,
        urls: Vec<StepUrl>,
    ) -> ServiceResult<StepRecord> {
        let mut inner = self.lock();
        let record = inner
            .steps
            .get_mut(&step)
            .ok_or_else(|| not_found(ResourcePath::StepLogs(step)))?;
        record.results = Some(results);
        record.state_string = results.to_string();
        record.urls = urls;
        Ok(record.clone())
    }

    /// Attach a finished log with its full content to a step
    pub fn add_log(
        &self,
        step: StepId,
        name: &str,
        log_type: LogType,
        content: &str,
    ) -> ServiceResult<LogRecord> {
        let mut inner = self.lock();
        if !inner.steps.contains_key(&step) {
            return Err(not_found(ResourcePath::StepLogs(step)));
        }
        inner.next_log += 1;
        let logid = LogId(inner.next_log);
        let log = LogRecord {
            logid,
            stepid: step,
            name: name.to_string(),
            log_type,
            num_lines: content.lines().count(),
        };
        inner.logs.insert(logid, log.clone());
        inner.contents.insert(
            logid,
            LogContent {
                logid,
                firstline: 0,
                content: content.to_string(),
            },
        );
        Ok(log)
    }

    pub fn set_property(&self, unit: UnitId, name: impl Into<String>, value: PropertyValue) {
        self.lock()
            .properties
            .entry(unit)
            .or_default()
            .insert(name.into(), value);
    }

    /// Store a change and assign it an identifier
    pub fn add_change(&self, mut change: ChangeRecord) -> ChangeRecord {
        let mut inner = self.lock();
        inner.next_change += 1;
        let id = ChangeId(inner.next_change);
        change.changeid = Some(id);
        inner.changes.insert(id, change.clone());
        change
    }

    pub fn changes(&self) -> Vec<ChangeRecord> {
        self.lock().changes.values().cloned().collect()
    }

    pub fn steps(&self, unit: UnitId) -> ServiceResult<Vec<StepRecord>> {
        let inner = self.lock();
        if !inner.units.contains_key(&unit) {
            return Err(not_found(ResourcePath::UnitSteps(unit)));
        }
        Ok(inner
            .steps
            .values()
            .filter(|s| s.unitid == unit)
            .cloned()
            .collect())
    }

    pub fn logs(&self, step: StepId) -> ServiceResult<Vec<LogRecord>> {
        let inner = self.lock();
        if !inner.steps.contains_key(&step) {
            return Err(not_found(ResourcePath::StepLogs(step)));
        }
        Ok(inner
            .logs
            .values()
            .filter(|l| l.stepid == step)
            .cloned()
            .collect())
    }

    pub fn log_content(&self, log: LogId) -> ServiceResult<LogContent> {
        self.lock()
            .contents
            .get(&log)
            .cloned()
            .ok_or_else(|| not_found(ResourcePath::LogContent(log)))
    }

    pub fn properties(&self, unit: UnitId) -> ServiceResult<Properties> {
        let inner = self.lock();
        if !inner.units.contains_key(&unit) {
            return Err(not_found(ResourcePath::UnitProperties(unit)));
        }
        Ok(inner.properties.get(&unit).cloned().unwrap_or_default())
    }
}
