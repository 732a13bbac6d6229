//! Harness Configuration
//!
//! Timing and lifecycle settings for a harness context

use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    /// Interval between readiness polls; the first poll is immediate
    pub poll_interval: Duration,
    /// Upper bound on the readiness wait. `None` defers to the test's own timeout.
    pub readiness_timeout: Option<Duration>,
    /// Upper bound on a single trigger-and-wait
    pub correlation_timeout: Option<Duration>,
    /// Scheduler used by `force_unit`
    pub force_scheduler: String,
    /// Create a temporary base directory during setup
    pub use_basedir: bool,
    pub basedir_prefix: String,
    /// Render the diagnostic dump when a test fails
    pub dump_on_failure: bool,
    pub log_level: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            readiness_timeout: None,
            correlation_timeout: None,
            force_scheduler: "force".to_string(),
            use_basedir: true,
            basedir_prefix: "harness-".to_string(),
            dump_on_failure: true,
            log_level: "info".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Create a new builder
    pub fn builder() -> crate::config::builder::HarnessConfigBuilder {
        crate::config::builder::HarnessConfigBuilder::new()
    }

    /// Reject settings the readiness poller cannot run with
    pub fn validate(&self) -> HarnessResult<()> {
        if self.poll_interval.is_zero() {
            return Err(HarnessError::InvalidConfig {
                field: "poll_interval".to_string(),
                value: format!("{:?}", self.poll_interval),
            });
        }
        Ok(())
    }
}
