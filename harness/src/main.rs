//! Harness Scenario Runner
//!
//! Runs named scenarios against the in-process sandbox service:
//! - Starts the service and waits for its listeners to subscribe
//! - Triggers units and correlates their completion events
//! - Dumps the unit database when a scenario fails

use clap::Parser;
use std::time::Duration;
use tokio::time::timeout;

use harness::{HarnessConfig, TestScenarios};
use shared::logging::{ComponentId, init_tracing};

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Deterministic test harness for event-driven orchestration services")]
struct Args {
    /// Test scenario to run (force, change, stale, failing, all)
    #[arg(long, default_value = "all")]
    scenario: String,

    /// Readiness poll interval in milliseconds
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    poll_interval_ms: u64,

    /// Scenario timeout in seconds
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Enable verbose tracing output
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = HarnessConfig::builder()
        .poll_interval(Duration::from_millis(args.poll_interval_ms))
        .correlation_timeout(Duration::from_secs(args.timeout_secs))
        .log_level(if args.verbose { "debug" } else { "info" })
        .build();
    init_tracing(ComponentId::Harness, Some(&config.log_level));

    tracing::info!("🧪 Starting harness scenario runner");
    tracing::info!("Scenario: {}, Timeout: {}s", args.scenario, args.timeout_secs);

    let scenarios = TestScenarios::new(config);

    match timeout(
        Duration::from_secs(args.timeout_secs),
        scenarios.run_scenario(&args.scenario),
    )
    .await
    {
        Ok(Ok(())) => {
            tracing::info!("✅ Test scenario '{}' completed successfully", args.scenario);
            Ok(())
        }
        Ok(Err(e)) => {
            tracing::error!("❌ Test scenario '{}' failed: {:#}", args.scenario, e);
            Err(e)
        }
        Err(_) => {
            tracing::error!(
                "⏰ Test scenario '{}' timed out after {}s",
                args.scenario,
                args.timeout_secs
            );
            anyhow::bail!("Test timeout")
        }
    }
}
