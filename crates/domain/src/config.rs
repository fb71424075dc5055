//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE, DEFAULT_STALE_AFTER_HOURS, DEFAULT_SWEEP_CRON,
    FALLBACK_ACTIVITY_ID,
};
use crate::types::AccountingPolicy;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub consolidation: ConsolidationConfig,
    pub sweep: SweepConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// Consolidation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationConfig {
    /// Activity substituted when a raw record carries no category.
    pub default_activity_id: i64,
    /// Accounting policy applied to work proofs.
    pub work_proof_policy: AccountingPolicy,
    /// Accounting policy applied to time clockings.
    pub time_clocking_policy: AccountingPolicy,
}

/// Staleness sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Cron expression driving the background sweep.
    pub cron_expression: String,
    /// Age in hours after which an unconsolidated record is swept.
    pub stale_after_hours: u64,
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: DEFAULT_DB_PATH.to_string(),
                pool_size: DEFAULT_DB_POOL_SIZE,
            },
            consolidation: ConsolidationConfig {
                default_activity_id: FALLBACK_ACTIVITY_ID,
                work_proof_policy: AccountingPolicy::Sum,
                time_clocking_policy: AccountingPolicy::Sum,
            },
            sweep: SweepConfig {
                cron_expression: DEFAULT_SWEEP_CRON.to_string(),
                stale_after_hours: DEFAULT_STALE_AFTER_HOURS,
                enabled: true,
            },
        }
    }
}
