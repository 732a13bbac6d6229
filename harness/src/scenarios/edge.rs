//! Edge Cases and Error Scenarios
//!
//! Stale completions on the bus and failing units

use anyhow::{anyhow, bail, ensure};
use futures_util::FutureExt;
use std::sync::Arc;
use std::time::Duration;

use crate::runtime::{ConvergencePoller, WatchedCondition};
use crate::{EnrichOptions, HarnessConfig, HarnessContext, HarnessError};
use sandbox::{LogScript, SandboxConfig, SandboxService, StepScript};
use shared::{ResultCode, Trigger, TriggerControl};

/// A unit still running when the next trigger is issued must not be
/// mistaken for the triggered one
pub async fn stale(config: HarnessConfig) -> anyhow::Result<()> {
    tracing::info!("🧪 Stale: earlier unit finishes while waiting");

    let sandbox = SandboxConfig::builder()
        .first_unit_id(5)
        .step_delay(Duration::from_millis(200))
        .build();
    let service = Arc::new(SandboxService::new(sandbox)?);
    let poll_interval = Duration::from_millis(50);

    HarnessContext::run(service, config, move |ctx| {
        async move {
            let service = ctx.service().clone();
            service.invoke_trigger(&Trigger::force("force")).await?;

            let observed = service.clone();
            ConvergencePoller::new(poll_interval)
                .with_condition(WatchedCondition::new("first unit started", move || {
                    Ok(!observed.store().units().is_empty())
                }))
                .wait()
                .await?;

            let unit = ctx.force_unit(EnrichOptions::none()).await?;
            ensure!(
                unit.unit.unitid.0 == 6,
                "expected unit 6, correlated unit {}",
                unit.unit.unitid
            );
            Ok(())
        }
        .boxed()
    })
    .await?;

    tracing::info!("✅ Stale: PASSED");
    Ok(())
}

/// A failing unit fails the test and produces the unit dump
pub async fn failing(config: HarnessConfig) -> anyhow::Result<()> {
    tracing::info!("🧪 Failing: failed unit produces a dump");

    let sandbox = SandboxConfig::builder()
        .steps(vec![
            StepScript::new("checkout", ResultCode::Success)
                .with_log(LogScript::stdio("stdio", "hgit checkout\nodone\n")),
            StepScript::new("test", ResultCode::Failure)
                .with_log(LogScript::stdio("stdio", "hcargo test\norunning 3 tests\neassertion failed\n")),
        ])
        .build();
    let service = Arc::new(SandboxService::new(sandbox)?);

    let result = HarnessContext::run(service.clone(), config, |ctx| {
        async move {
            let unit = ctx.force_unit(EnrichOptions::none()).await?;
            match unit.unit.results {
                Some(ResultCode::Success) => Ok(()),
                other => Err(anyhow!("unit finished with {}", ResultCode::describe(other))),
            }
        }
        .boxed()
    })
    .await;

    match result {
        Err(HarnessError::TestFailed { reason, dump }) => {
            ensure!(dump.contains("*** UNIT 1 ***"), "dump is missing the unit");
            ensure!(dump.contains("assertion failed"), "dump is missing the failing log");
            ensure!(!service.is_running().await, "service still running after teardown");
            tracing::info!("Expected failure: {reason}\n{dump}");
        }
        Err(other) => bail!("unexpected error: {other}"),
        Ok(()) => bail!("failing unit was reported as passing"),
    }

    tracing::info!("✅ Failing: PASSED");
    Ok(())
}
