//! Per-test lifecycle of the service under test
//!
//! A [`HarnessContext`] is created by [`HarnessContext::setup`], which starts
//! the service and blocks on the readiness barrier, and is consumed by
//! [`HarnessContext::teardown`], which dumps the unit database when the test
//! failed and then always stops the service and removes the base directory.

use futures_util::future::BoxFuture;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::correlator::EventCorrelator;
use super::readiness::{ConvergenceReport, ReadinessBarrier};
use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::testing::dump::{DUMP_HEADER, render_failure_dump};
use crate::testing::enricher::{EnrichOptions, EnrichedUnit, ResultEnricher};
use shared::logging::{ComponentId, log_error, log_startup, log_success};
use shared::{ChangeRecord, ServiceUnderTest, Trigger, UnitRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Unconfigured,
    Starting,
    Ready,
    Active,
    Stopping,
    Stopped,
    Failed,
}

impl fmt::Display for HarnessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HarnessState::Unconfigured => "unconfigured",
            HarnessState::Starting => "starting",
            HarnessState::Ready => "ready",
            HarnessState::Active => "active",
            HarnessState::Stopping => "stopping",
            HarnessState::Stopped => "stopped",
            HarnessState::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Verdict handed to teardown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed { reason: String },
}

impl TestOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        TestOutcome::Failed {
            reason: reason.into(),
        }
    }
}

pub struct HarnessContext<S: ServiceUnderTest> {
    service: Arc<S>,
    config: HarnessConfig,
    run_id: Uuid,
    state: HarnessState,
    history: Vec<HarnessState>,
    basedir: Option<TempDir>,
    correlator: EventCorrelator,
    readiness: Option<ConvergenceReport>,
    torn_down: bool,
}

impl<S: ServiceUnderTest> HarnessContext<S> {
    /// Start the service and wait until every event consumer has attached
    ///
    /// The config is validated before anything is started. If anything fails
    /// after the service was started, the service is stopped before the error
    /// is returned.
    pub async fn setup(service: Arc<S>, config: HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;
        let correlator = EventCorrelator::default().with_timeout(config.correlation_timeout);
        let mut ctx = Self {
            service,
            config,
            run_id: Uuid::new_v4(),
            state: HarnessState::Unconfigured,
            history: vec![HarnessState::Unconfigured],
            basedir: None,
            correlator,
            readiness: None,
            torn_down: false,
        };

        log_startup(ComponentId::Harness, &format!("harness run {}", ctx.run_id));
        ctx.transition(HarnessState::Starting);

        if ctx.config.use_basedir {
            match tempfile::Builder::new()
                .prefix(&ctx.config.basedir_prefix)
                .tempdir()
            {
                Ok(basedir) => {
                    debug!(basedir = %basedir.path().display(), "📁 Base directory created");
                    ctx.basedir = Some(basedir);
                }
                Err(e) => {
                    // Nothing was started yet
                    ctx.transition(HarnessState::Stopped);
                    ctx.torn_down = true;
                    return Err(HarnessError::SetupFailed {
                        reason: format!("cannot create base directory: {e}"),
                    });
                }
            }
        }

        if let Err(e) = ctx.service.start().await {
            ctx.abort_setup().await;
            return Err(HarnessError::SetupFailed {
                reason: format!("service start failed: {e}"),
            });
        }

        let readiness = match ctx.await_readiness().await {
            Ok(report) => report,
            Err(e) => {
                ctx.abort_setup().await;
                return Err(e);
            }
        };

        ctx.readiness = Some(readiness);
        ctx.transition(HarnessState::Ready);
        log_success(ComponentId::Harness, "Service ready");
        Ok(ctx)
    }

    async fn await_readiness(&self) -> HarnessResult<ConvergenceReport> {
        ReadinessBarrier::from_listeners(self.service.listeners(), self.config.poll_interval)?
            .with_timeout(self.config.readiness_timeout)
            .wait()
            .await
    }

    async fn abort_setup(&mut self) {
        self.transition(HarnessState::Stopping);
        if let Err(e) = self.service.stop().await {
            log_error(ComponentId::Harness, "Stopping service after failed setup", &e);
        }
        self.release_basedir();
        self.transition(HarnessState::Stopped);
        self.torn_down = true;
    }

    /// Run `body` between setup and teardown
    ///
    /// Teardown always runs once setup succeeded; an error from `body` fails
    /// the test and the returned error carries the unit dump.
    pub async fn run<F>(service: Arc<S>, config: HarnessConfig, body: F) -> HarnessResult<()>
    where
        F: for<'a> FnOnce(&'a mut HarnessContext<S>) -> BoxFuture<'a, anyhow::Result<()>>,
    {
        let mut ctx = Self::setup(service, config).await?;
        let outcome = match body(&mut ctx).await {
            Ok(()) => TestOutcome::Passed,
            Err(e) => {
                error!(run = %ctx.run_id, "❌ Test body failed: {e:#}");
                TestOutcome::failed(format!("{e:#}"))
            }
        };
        ctx.teardown(outcome).await
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    /// Every state entered so far, in order
    pub fn history(&self) -> &[HarnessState] {
        &self.history
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    pub fn basedir(&self) -> Option<&Path> {
        self.basedir.as_ref().map(TempDir::path)
    }

    /// Readiness observed during setup
    pub fn readiness(&self) -> Option<&ConvergenceReport> {
        self.readiness.as_ref()
    }

    fn transition(&mut self, next: HarnessState) {
        if self.state == next {
            return;
        }
        debug!(run = %self.run_id, from = %self.state, to = %next, "Harness state change");
        self.state = next;
        self.history.push(next);
    }

    fn ensure_usable(&self, action: &str) -> HarnessResult<()> {
        match self.state {
            HarnessState::Ready | HarnessState::Active => Ok(()),
            state => Err(HarnessError::InvalidState {
                state: state.to_string(),
                action: action.to_string(),
            }),
        }
    }

    /// Issue `trigger`, wait for the unit it started to finish and enrich it
    ///
    /// Takes `&mut self`, so only one trigger can be in flight per context.
    pub async fn trigger_and_wait(
        &mut self,
        trigger: Trigger,
        options: EnrichOptions,
    ) -> HarnessResult<EnrichedUnit> {
        self.ensure_usable("trigger a unit")?;
        self.transition(HarnessState::Active);

        info!(run = %self.run_id, trigger = %trigger, "⚡ Triggering unit");
        let unit = self
            .correlator
            .invoke(self.service.as_ref(), &trigger)
            .await?;
        self.enrich(unit, options).await
    }

    /// Force a unit through the configured force scheduler
    pub async fn force_unit(&mut self, options: EnrichOptions) -> HarnessResult<EnrichedUnit> {
        let trigger = Trigger::force(self.config.force_scheduler.clone());
        self.trigger_and_wait(trigger, options).await
    }

    /// Submit a change and wait for the unit a consuming scheduler starts for it
    pub async fn submit_change(
        &mut self,
        change: ChangeRecord,
        options: EnrichOptions,
    ) -> HarnessResult<EnrichedUnit> {
        self.trigger_and_wait(Trigger::change(change), options).await
    }

    pub async fn enrich(
        &self,
        unit: UnitRecord,
        options: EnrichOptions,
    ) -> HarnessResult<EnrichedUnit> {
        self.ensure_usable("enrich a unit")?;
        ResultEnricher::new(self.service.as_ref())
            .enrich(unit, options)
            .await
    }

    /// Stop the service and release the base directory
    ///
    /// On a failed outcome the unit dump is rendered first and returned in
    /// [`HarnessError::TestFailed`]. Stopping happens even if the dump fails.
    pub async fn teardown(mut self, outcome: TestOutcome) -> HarnessResult<()> {
        if self.torn_down {
            return Ok(());
        }

        let failure = match outcome {
            TestOutcome::Passed => None,
            TestOutcome::Failed { reason } => {
                self.transition(HarnessState::Failed);
                warn!(run = %self.run_id, "💥 Test failed: {reason}");
                Some((reason, self.failure_dump().await))
            }
        };

        self.transition(HarnessState::Stopping);
        let stopped = self.service.stop().await;
        if let Err(e) = &stopped {
            log_error(ComponentId::Harness, "Stopping service", e);
        }
        self.release_basedir();
        self.transition(HarnessState::Stopped);
        self.torn_down = true;
        info!(run = %self.run_id, "🏁 Harness torn down");

        match failure {
            Some((reason, dump)) => Err(HarnessError::TestFailed { reason, dump }),
            None => stopped.map_err(HarnessError::from),
        }
    }

    async fn failure_dump(&self) -> String {
        if !self.config.dump_on_failure {
            return String::new();
        }
        match render_failure_dump(self.service.as_ref()).await {
            Ok(dump) => dump,
            Err(e) => {
                log_error(ComponentId::Harness, "Rendering failure dump", &e);
                format!("{DUMP_HEADER}\n(dump unavailable: {e})\n")
            }
        }
    }

    fn release_basedir(&mut self) {
        if let Some(basedir) = self.basedir.take() {
            let path = basedir.path().to_path_buf();
            if let Err(e) = basedir.close() {
                warn!(basedir = %path.display(), error = %e, "Failed to remove base directory");
            }
        }
    }
}

impl<S: ServiceUnderTest> fmt::Debug for HarnessContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HarnessContext")
            .field("config", &self.config)
            .field("run_id", &self.run_id)
            .field("state", &self.state)
            .field("history", &self.history)
            .field("basedir", &self.basedir)
            .field("correlator", &self.correlator)
            .field("readiness", &self.readiness)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl<S: ServiceUnderTest> Drop for HarnessContext<S> {
    fn drop(&mut self) {
        if self.torn_down {
            return;
        }
        warn!(run = %self.run_id, state = %self.state, "⚠️ Harness dropped without teardown, stopping service");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let service = self.service.clone();
                handle.spawn(async move {
                    if let Err(e) = service.stop().await {
                        warn!(error = %e, "Deferred service stop failed");
                    }
                });
            }
            Err(_) => warn!("No runtime available to stop the service"),
        }
    }
}
