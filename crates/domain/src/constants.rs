//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! consolidation engine.

// Accounting defaults
/// Activity used when a raw record carries no explicit category and the
/// directory has no activities configured. 9 is the conventional
/// "Development" activity in the upstream tracker.
pub const FALLBACK_ACTIVITY_ID: i64 = 9;
/// Fixed cadence of passive evidence capture, in minutes.
pub const DEFAULT_CAPTURE_INTERVAL_MINUTES: u32 = 10;

// Staleness sweep
/// Age after which an unconsolidated record is picked up by the sweep.
pub const DEFAULT_STALE_AFTER_HOURS: u64 = 4;
/// Default sweep cadence (every 15 minutes).
pub const DEFAULT_SWEEP_CRON: &str = "0 */15 * * * *";

// Database defaults
pub const DEFAULT_DB_PATH: &str = "worklog.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 8;
