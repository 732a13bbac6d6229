//! Common test utilities and infrastructure
//!
//! Shared fixtures and helpers used across the harness test suites.

pub mod fixtures;
pub mod helpers;

pub use fixtures::TestFixtures;
pub use helpers::{ProbeFailingService, TestHelpers};
