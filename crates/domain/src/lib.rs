//! # Worklog Domain
//!
//! Business domain types and models for the worklog consolidation engine.
//!
//! This crate contains:
//! - Raw record and time entry types plus their state machines
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other worklog crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
