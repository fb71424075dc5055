//! # Worklog Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite-backed raw record stores and the time entry writer
//! - The configuration loader
//! - The cron-driven staleness sweep scheduler
//!
//! ## Architecture
//! - Implements traits defined in `worklog-core`
//! - Depends on `worklog-domain` and `worklog-core`
//! - Contains all "impure" code (I/O, scheduling)

pub mod config;
pub mod database;
pub mod errors;
pub mod scheduling;

// Re-export commonly used items
pub use database::{
    DbManager, SqliteActivityDirectory, SqliteTimeClockingRepository, SqliteTimeEntryRepository,
    SqliteWorkProofRepository,
};
pub use errors::InfraError;
pub use scheduling::{
    SchedulerError, SchedulerResult, StaleSweepJob, SweepJob, SweepScheduler, SweepSchedulerConfig,
};
