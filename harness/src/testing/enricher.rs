//! Flag-driven enrichment of a finished unit with its descendants

use serde::Serialize;
use tracing::debug;

use crate::error::{HarnessError, HarnessResult};
use shared::{
    DataApi, LogContent, LogRecord, Properties, ResourcePath, StepRecord, UnitRecord,
};

/// Which descendants to fetch
///
/// `logs` only has an effect together with `steps`: logs hang off steps and
/// are never fetched on their own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichOptions {
    pub steps: bool,
    pub properties: bool,
    pub logs: bool,
}

impl EnrichOptions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            steps: true,
            properties: true,
            logs: true,
        }
    }

    pub fn with_steps(mut self) -> Self {
        self.steps = true;
        self
    }

    pub fn with_logs(mut self) -> Self {
        self.logs = true;
        self
    }

    pub fn with_properties(mut self) -> Self {
        self.properties = true;
        self
    }

    fn fetch_logs(&self) -> bool {
        self.steps && self.logs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedLog {
    #[serde(flatten)]
    pub log: LogRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<LogContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedStep {
    #[serde(flatten)]
    pub step: StepRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<EnrichedLog>>,
}

/// A unit together with whichever descendants were requested
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrichedUnit {
    #[serde(flatten)]
    pub unit: UnitRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<EnrichedStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

impl EnrichedUnit {
    pub fn bare(unit: UnitRecord) -> Self {
        Self {
            unit,
            steps: None,
            properties: None,
        }
    }
}

/// Walks the read API below a unit
pub struct ResultEnricher<'a, D: DataApi + ?Sized> {
    api: &'a D,
}

impl<'a, D: DataApi + ?Sized> ResultEnricher<'a, D> {
    pub fn new(api: &'a D) -> Self {
        Self { api }
    }

    /// Attach the requested descendants to `unit`
    ///
    /// Collections keep the order the read API returns them in. Any read
    /// failure aborts the whole enrichment.
    pub async fn enrich(
        &self,
        unit: UnitRecord,
        options: EnrichOptions,
    ) -> HarnessResult<EnrichedUnit> {
        let id = unit.unitid;
        let mut enriched = EnrichedUnit::bare(unit);

        if options.steps {
            let steps = self
                .api
                .get_steps(id)
                .await
                .map_err(|e| HarnessError::read_failed(ResourcePath::UnitSteps(id), e))?;

            let mut enriched_steps = Vec::with_capacity(steps.len());
            for step in steps {
                let logs = if options.fetch_logs() {
                    Some(self.logs_of(&step).await?)
                } else {
                    None
                };
                enriched_steps.push(EnrichedStep { step, logs });
            }
            enriched.steps = Some(enriched_steps);
        }

        if options.properties {
            let properties = self
                .api
                .get_properties(id)
                .await
                .map_err(|e| HarnessError::read_failed(ResourcePath::UnitProperties(id), e))?;
            enriched.properties = Some(properties);
        }

        debug!(unit = %id, ?options, "Unit enriched");
        Ok(enriched)
    }

    async fn logs_of(&self, step: &StepRecord) -> HarnessResult<Vec<EnrichedLog>> {
        let logs = self
            .api
            .get_logs(step.stepid)
            .await
            .map_err(|e| HarnessError::read_failed(ResourcePath::StepLogs(step.stepid), e))?;

        let mut enriched = Vec::with_capacity(logs.len());
        for log in logs {
            let content = self
                .api
                .get_log_content(log.logid)
                .await
                .map_err(|e| HarnessError::read_failed(ResourcePath::LogContent(log.logid), e))?;
            enriched.push(EnrichedLog {
                log,
                content: Some(content),
            });
        }
        Ok(enriched)
    }
}
