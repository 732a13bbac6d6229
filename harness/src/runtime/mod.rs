//! Runtime Management
//!
//! Readiness polling, trigger correlation and the per-test lifecycle.

pub mod context;
pub mod correlator;
pub mod readiness;

// Re-export main types
pub use context::{HarnessContext, HarnessState, TestOutcome};
pub use correlator::{Correlation, EventCorrelator, Phase};
pub use readiness::{
    ConvergencePoller, ConvergenceReport, PollTimer, ReadinessBarrier, WatchedCondition,
};
