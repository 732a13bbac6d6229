//! In-process orchestration service used as the system under test
//!
//! The sandbox reproduces the behaviour the harness has to cope with: it
//! starts without a readiness signal, its change-consuming schedulers attach
//! to the event bus some time after `start()` returns, and it reports unit
//! lifecycle exclusively through `units.<id>.started` / `units.<id>.finished`
//! events. It is intentionally small and is not an orchestration engine.

pub mod bus;
pub mod config;
pub mod engine;
pub mod scheduler;
pub mod service;
pub mod store;

pub use bus::InMemoryBus;
pub use config::{ChangeSchedulerConfig, LogScript, SandboxConfig, SandboxConfigBuilder, StepScript};
pub use engine::{UnitExecutor, UnitRequest};
pub use scheduler::{ChangeScheduler, ForceScheduler};
pub use service::SandboxService;
pub use store::UnitStore;
