//! Test Scenarios
//!
//! Named scenarios run against the sandbox service

pub mod core;
pub mod edge;

use crate::config::HarnessConfig;
use shared::logging::{ComponentId, log_progress};

pub struct TestScenarios {
    config: HarnessConfig,
}

impl TestScenarios {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Run a specific scenario by name
    pub async fn run_scenario(&self, name: &str) -> anyhow::Result<()> {
        let config = self.config.clone();
        log_progress(ComponentId::Harness, "Scenario", name);

        match name {
            // Core functionality
            "force" => core::force(config).await,
            "change" => core::change(config).await,

            // Edge cases
            "stale" => edge::stale(config).await,
            "failing" => edge::failing(config).await,

            "all" => {
                tracing::info!("🧪 Running all scenarios");
                core::force(config.clone()).await?;
                core::change(config.clone()).await?;
                edge::stale(config.clone()).await?;
                edge::failing(config).await?;
                tracing::info!("🏆 All scenarios completed successfully");
                Ok(())
            }

            _ => anyhow::bail!(
                "Unknown test scenario: '{}'. Available: {}",
                name,
                Self::available_scenarios().join(", ")
            ),
        }
    }

    /// Get list of available scenarios
    pub fn available_scenarios() -> Vec<&'static str> {
        vec!["force", "change", "stale", "failing", "all"]
    }
}
