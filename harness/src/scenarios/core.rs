//! Core Scenarios
//!
//! Forced units and change-driven units on a healthy sandbox

use anyhow::{Context, ensure};
use futures_util::FutureExt;
use std::sync::Arc;
use std::time::Duration;

use crate::{EnrichOptions, HarnessConfig, HarnessContext};
use sandbox::{SandboxConfig, SandboxService};
use shared::{ChangeRecord, ResultCode};

/// Force a unit and check its steps, logs and properties
pub async fn force(config: HarnessConfig) -> anyhow::Result<()> {
    tracing::info!("🧪 Force: direct invocation of the force scheduler");

    let service = Arc::new(SandboxService::new(SandboxConfig::default())?);
    HarnessContext::run(service, config, |ctx| {
        async move {
            let unit = ctx.force_unit(EnrichOptions::all()).await?;
            ensure!(
                unit.unit.results == Some(ResultCode::Success),
                "unit {} finished with {}",
                unit.unit.unitid,
                ResultCode::describe(unit.unit.results)
            );

            let steps = unit.steps.context("steps were not fetched")?;
            ensure!(steps.len() == 2, "expected 2 steps, got {}", steps.len());
            for step in &steps {
                let logs = step.logs.as_ref().context("logs were not fetched")?;
                ensure!(
                    logs.iter().all(|log| log.content.is_some()),
                    "step {} has a log without content",
                    step.step.name
                );
            }
            ensure!(unit.properties.is_some(), "properties were not fetched");
            Ok(())
        }
        .boxed()
    })
    .await?;

    tracing::info!("✅ Force: PASSED");
    Ok(())
}

/// Submit a change once the late-subscribing scheduler is ready
pub async fn change(config: HarnessConfig) -> anyhow::Result<()> {
    tracing::info!("🧪 Change: change submitted after readiness");

    let sandbox = SandboxConfig::builder()
        .without_change_schedulers()
        .change_scheduler("change-consumer", Duration::from_millis(1500))
        .subscribe_jitter(Duration::from_millis(500), 7)
        .build();
    let service = Arc::new(SandboxService::new(sandbox)?);

    HarnessContext::run(service, config, |ctx| {
        async move {
            let polled = ctx.readiness().map(|r| r.polled).unwrap_or(false);
            ensure!(polled, "readiness should have required polling");

            let change = ChangeRecord::new("harness", "scenario change")
                .with_branch("main")
                .with_revision("abc123");
            let unit = ctx
                .submit_change(change, EnrichOptions::none().with_properties())
                .await?;

            ensure!(
                unit.unit.scheduler == "change-consumer",
                "unit {} was started by {}",
                unit.unit.unitid,
                unit.unit.scheduler
            );
            let properties = unit.properties.context("properties were not fetched")?;
            ensure!(
                properties.get("branch").and_then(|p| p.value.as_str()) == Some("main"),
                "branch property missing"
            );
            Ok(())
        }
        .boxed()
    })
    .await?;

    tracing::info!("✅ Change: PASSED");
    Ok(())
}
