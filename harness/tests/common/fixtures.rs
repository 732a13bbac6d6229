//! Test fixtures and constants

use std::time::Duration;

use harness::HarnessConfig;
use sandbox::{LogScript, SandboxConfig, StepScript};
use shared::{ChangeRecord, ResultCode};

pub struct TestFixtures;

impl TestFixtures {
    pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
    pub const CORRELATION_TIMEOUT: Duration = Duration::from_secs(30);
    pub const CHANGE_CONSUMER: &'static str = "change-consumer";
    pub const FORCE_SCHEDULER: &'static str = "force";
    pub const FAILURE_MARKER: &'static str = "assertion failed: left == right";

    /// Harness config with a bounded correlation wait
    pub fn harness_config() -> HarnessConfig {
        HarnessConfig::builder()
            .poll_interval(Self::POLL_INTERVAL)
            .correlation_timeout(Self::CORRELATION_TIMEOUT)
            .build()
    }

    /// Sandbox whose change consumer attaches `delay` after start
    pub fn late_consumer(delay: Duration) -> SandboxConfig {
        SandboxConfig::builder()
            .change_scheduler(Self::CHANGE_CONSUMER, delay)
            .build()
    }

    /// Sandbox without any change-consuming scheduler
    pub fn force_only() -> SandboxConfig {
        SandboxConfig::builder().without_change_schedulers().build()
    }

    /// Sandbox whose second step fails with a structured log
    pub fn failing_steps() -> SandboxConfig {
        let steps = vec![
            StepScript::new("checkout", ResultCode::Success)
                .with_log(LogScript::stdio("stdio", "hgit checkout main\noUpdated 3 files\n")),
            StepScript::new("test", ResultCode::Failure).with_log(LogScript::stdio(
                "stdio",
                format!("hcargo test\norunning 4 tests\ne{}\n", Self::FAILURE_MARKER),
            )),
        ];
        SandboxConfig::builder()
            .without_change_schedulers()
            .steps(steps)
            .build()
    }

    pub fn change() -> ChangeRecord {
        ChangeRecord::new("alice", "fix flaky readiness")
            .with_branch("main")
            .with_revision("abc123")
    }
}
