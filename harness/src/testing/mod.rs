//! Testing Framework
//!
//! Result enrichment and the diagnostic dump rendered for failed tests.

pub mod dump;
pub mod enricher;

// Re-export main types
pub use dump::{DUMP_HEADER, UnitDump, render_failure_dump, render_unit};
pub use enricher::{EnrichOptions, EnrichedLog, EnrichedStep, EnrichedUnit, ResultEnricher};
