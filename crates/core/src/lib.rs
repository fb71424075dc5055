//! # Worklog Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - The accounting policy and eligibility rules
//! - Port/adapter interfaces (traits)
//! - The consolidation engine and staleness sweep services
//!
//! ## Architecture Principles
//! - Only depends on `worklog-domain`
//! - No database or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod consolidation;

// Re-export specific items to avoid ambiguity
pub use consolidation::policy::aggregate_hours;
pub use consolidation::ports::{ActivityDirectory, RawRecordStore};
pub use consolidation::ConsolidationService;
