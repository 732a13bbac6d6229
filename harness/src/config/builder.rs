//! Harness Configuration Builder
//!
//! Provides a fluent builder for harness configurations

use super::HarnessConfig;
use std::time::Duration;

pub struct HarnessConfigBuilder {
    config: HarnessConfig,
}

impl HarnessConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: HarnessConfig::default(),
        }
    }

    /// Set the readiness poll interval
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Bound the readiness wait
    pub fn readiness_timeout(mut self, timeout: Duration) -> Self {
        self.config.readiness_timeout = Some(timeout);
        self
    }

    /// Bound each trigger-and-wait
    pub fn correlation_timeout(mut self, timeout: Duration) -> Self {
        self.config.correlation_timeout = Some(timeout);
        self
    }

    /// Set the scheduler used for forced units
    pub fn force_scheduler<S: Into<String>>(mut self, name: S) -> Self {
        self.config.force_scheduler = name.into();
        self
    }

    /// Skip base directory creation
    pub fn without_basedir(mut self) -> Self {
        self.config.use_basedir = false;
        self
    }

    pub fn basedir_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.basedir_prefix = prefix.into();
        self
    }

    /// Enable or disable the failure dump
    pub fn dump_on_failure(mut self, enabled: bool) -> Self {
        self.config.dump_on_failure = enabled;
        self
    }

    /// Set log level (trace, debug, info, warn, error)
    pub fn log_level<S: Into<String>>(mut self, level: S) -> Self {
        self.config.log_level = level.into();
        self
    }

    pub fn build(self) -> HarnessConfig {
        self.config
    }
}

impl Default for HarnessConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.readiness_timeout.is_none());
        assert!(config.correlation_timeout.is_none());
        assert!(config.dump_on_failure);
    }

    #[test]
    fn test_builder_overrides() {
        let config = HarnessConfig::builder()
            .poll_interval(Duration::from_millis(100))
            .correlation_timeout(Duration::from_secs(5))
            .force_scheduler("nightly")
            .without_basedir()
            .build();

        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.correlation_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.force_scheduler, "nightly");
        assert!(!config.use_basedir);
    }

    #[test]
    fn test_zero_poll_interval_is_rejected() {
        let config = HarnessConfig::builder().poll_interval(Duration::ZERO).build();
        assert!(matches!(
            config.validate(),
            Err(HarnessError::InvalidConfig { field, .. }) if field == "poll_interval"
        ));
        assert!(HarnessConfig::default().validate().is_ok());
    }
}
