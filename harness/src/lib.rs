//! Deterministic test harness for event-driven orchestration services
//!
//! The service under test accepts units of work and reports their lifecycle
//! only through a publish/subscribe bus, and it gives no signal once its
//! internal listeners have subscribed. This crate closes that startup race
//! and turns "trigger a unit and wait for it" into a single call.
//!
//! ## Main Interface
//!
//! [`HarnessContext`] drives one test: setup starts the service and waits on
//! the readiness barrier, `trigger_and_wait` correlates a trigger with the
//! unit it started and enriches the result, and teardown stops the service,
//! dumping every unit first if the test failed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures_util::FutureExt;
//! use harness::*;
//! use sandbox::SandboxService;
//! use std::sync::Arc;
//!
//! # async fn quick_start() -> Result<(), HarnessError> {
//! let service = Arc::new(SandboxService::with_defaults());
//! HarnessContext::run(service, HarnessConfig::default(), |ctx| {
//!     async move {
//!         let unit = ctx.force_unit(EnrichOptions::all()).await?;
//!         anyhow::ensure!(unit.unit.results == Some(shared::ResultCode::Success));
//!         Ok(())
//!     }
//!     .boxed()
//! })
//! .await
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod runtime;
pub mod scenarios;
pub mod testing;

// Main interfaces - re-exported at crate root for convenience
pub use config::{HarnessConfig, HarnessConfigBuilder};
pub use error::{HarnessError, HarnessResult};
pub use runtime::{HarnessContext, HarnessState, TestOutcome};

// Supporting types
pub use runtime::{
    ConvergencePoller, ConvergenceReport, Correlation, EventCorrelator, ReadinessBarrier,
    WatchedCondition,
};
pub use scenarios::TestScenarios;
pub use testing::{EnrichOptions, EnrichedLog, EnrichedStep, EnrichedUnit, ResultEnricher};
pub use testing::{render_failure_dump, render_unit};
