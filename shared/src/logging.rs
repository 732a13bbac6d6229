//! Shared logging utilities for consistent tracing across components

use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{error, info};

/// Component emitting a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    /// The test harness driving the service
    Harness,
    /// The in-process service under test
    Sandbox,
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentId::Harness => write!(f, "harness"),
            ComponentId::Sandbox => write!(f, "sandbox"),
        }
    }
}

fn level_filter(component: ComponentId, base_level: &str) -> String {
    match component {
        ComponentId::Harness => {
            format!("harness={base_level},sandbox={base_level},shared={base_level}")
        }
        ComponentId::Sandbox => format!("sandbox={base_level},shared={base_level}"),
    }
}

/// Initialize the tracing subscriber for a component
///
/// Safe to call more than once (e.g. from several tests); only the first
/// call installs a subscriber.
pub fn init_tracing(component: ComponentId, log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let base_level = log_level.unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_filter(component, base_level)));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Initialize tracing for tests, writing through the test writer
pub fn init_test_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(EnvFilter::new(level_filter(ComponentId::Harness, "debug")))
        .with_test_writer()
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Contextual logging helper for startup messages
pub fn log_startup(component: ComponentId, details: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(component: ComponentId, reason: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(component: ComponentId, context: &str, error: &dyn std::fmt::Display) {
    error!(
        component = %component,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(component: ComponentId, message: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}

/// Contextual logging helper for progress updates
pub fn log_progress(component: ComponentId, action: &str, details: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "📋 {}: {}",
        action,
        details
    );
}
