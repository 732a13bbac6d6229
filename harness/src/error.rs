//! Harness-specific error types

use shared::{ResourcePath, ServiceError};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Setup failed: {reason}")]
    SetupFailed { reason: String },

    #[error("Readiness probe failed for listener {listener}")]
    ReadinessProbe {
        listener: String,
        #[source]
        source: ServiceError,
    },

    #[error("Readiness not reached; still pending: {}", pending.join(", "))]
    ReadinessTimeout { pending: Vec<String> },

    #[error("Readiness poller stopped before all conditions were met")]
    PollerStopped,

    #[error("Trigger {trigger} failed")]
    TriggerFailed {
        trigger: String,
        #[source]
        source: ServiceError,
    },

    #[error("No matching completion within {timeout:?}")]
    CorrelationTimeout { timeout: Duration },

    #[error("Subscription to {topic} closed while waiting")]
    SubscriptionClosed { topic: String },

    #[error("Read of {path} failed")]
    ReadFailed {
        path: ResourcePath,
        #[source]
        source: ServiceError,
    },

    #[error("Cannot {action} while {state}")]
    InvalidState { state: String, action: String },

    #[error("Test failed: {reason}\n{dump}")]
    TestFailed { reason: String, dump: String },

    #[error("Invalid configuration: {field} = {value}")]
    InvalidConfig { field: String, value: String },

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),
}

impl HarnessError {
    pub fn read_failed(path: ResourcePath, source: ServiceError) -> Self {
        HarnessError::ReadFailed { path, source }
    }

    /// Diagnostic dump carried by a failed test, if any
    pub fn dump(&self) -> Option<&str> {
        match self {
            HarnessError::TestFailed { dump, .. } => Some(dump),
            _ => None,
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
