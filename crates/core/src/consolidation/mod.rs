//! Consolidation pipeline
//!
//! Rolls eligible raw records of one (issue, user, date) scope into exactly
//! one time entry: eligibility selection, accounting policy, the atomic
//! roll-up, and the staleness sweep that drives it in the background.

pub mod policy;
pub mod ports;
pub mod service;

pub use service::ConsolidationService;
