//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the environment carries no configuration, falls back to a file
//! 3. Probes multiple paths for config files
//! 4. Supports TOML and JSON formats
//!
//! ## Environment Variables
//! - `WORKLOG_DB_PATH`: Database file path
//! - `WORKLOG_DB_POOL_SIZE`: Connection pool size
//! - `WORKLOG_DEFAULT_ACTIVITY_ID`: Activity substituted for records
//!   without one
//! - `WORKLOG_SWEEP_CRON`: Cron expression for the staleness sweep
//! - `WORKLOG_SWEEP_STALE_AFTER_HOURS`: Age threshold for the sweep
//! - `WORKLOG_SWEEP_ENABLED`: Whether the background sweep runs
//!
//! Accounting policies are file-only configuration; the environment keeps
//! the defaults (`sum` for both kinds).

use std::path::{Path, PathBuf};

use worklog_domain::{Config, Result, WorklogError};

const ENV_DB_PATH: &str = "WORKLOG_DB_PATH";
const ENV_DB_POOL_SIZE: &str = "WORKLOG_DB_POOL_SIZE";
const ENV_DEFAULT_ACTIVITY_ID: &str = "WORKLOG_DEFAULT_ACTIVITY_ID";
const ENV_SWEEP_CRON: &str = "WORKLOG_SWEEP_CRON";
const ENV_SWEEP_STALE_AFTER_HOURS: &str = "WORKLOG_SWEEP_STALE_AFTER_HOURS";
const ENV_SWEEP_ENABLED: &str = "WORKLOG_SWEEP_ENABLED";

const PROBE_PATHS: &[&str] =
    &["config.toml", "worklog.toml", "config.json", "worklog.json"];

/// Load configuration with automatic fallback strategy.
///
/// # Errors
/// Returns `WorklogError::Config` if a present source cannot be parsed.
/// When neither environment nor file configuration exists, defaults apply.
pub fn load() -> Result<Config> {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), ".env loaded"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "failed to load .env"),
    }

    if let Some(config) = load_from_env()? {
        tracing::info!("configuration loaded from environment variables");
        return Ok(config);
    }

    match find_config_file() {
        Some(path) => {
            tracing::info!(path = %path.display(), "configuration loaded from file");
            load_from_file(&path)
        }
        None => {
            tracing::debug!("no configuration found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Load configuration overrides from the environment on top of defaults.
/// Returns `None` when no `WORKLOG_*` variable is set.
fn load_from_env() -> Result<Option<Config>> {
    let mut config = Config::default();
    let mut any = false;

    if let Some(path) = read_env(ENV_DB_PATH) {
        config.database.path = path;
        any = true;
    }
    if let Some(size) = read_env(ENV_DB_POOL_SIZE) {
        config.database.pool_size = parse_env(ENV_DB_POOL_SIZE, &size)?;
        any = true;
    }
    if let Some(id) = read_env(ENV_DEFAULT_ACTIVITY_ID) {
        config.consolidation.default_activity_id = parse_env(ENV_DEFAULT_ACTIVITY_ID, &id)?;
        any = true;
    }
    if let Some(cron) = read_env(ENV_SWEEP_CRON) {
        config.sweep.cron_expression = cron;
        any = true;
    }
    if let Some(hours) = read_env(ENV_SWEEP_STALE_AFTER_HOURS) {
        config.sweep.stale_after_hours = parse_env(ENV_SWEEP_STALE_AFTER_HOURS, &hours)?;
        any = true;
    }
    if let Some(enabled) = read_env(ENV_SWEEP_ENABLED) {
        config.sweep.enabled = parse_env(ENV_SWEEP_ENABLED, &enabled)?;
        any = true;
    }

    Ok(any.then_some(config))
}

/// Load configuration from a specific TOML or JSON file.
pub fn load_from_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|err| {
        WorklogError::Config(format!("failed to read {}: {err}", path.display()))
    })?;

    let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&contents).map_err(|err| {
            WorklogError::Config(format!("invalid JSON in {}: {err}", path.display()))
        })
    } else {
        toml::from_str(&contents).map_err(|err| {
            WorklogError::Config(format!("invalid TOML in {}: {err}", path.display()))
        })
    }
}

fn find_config_file() -> Option<PathBuf> {
    for base in [".", ".."] {
        for name in PROBE_PATHS {
            let candidate = Path::new(base).join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

fn read_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|err| WorklogError::Config(format!("invalid value for {key}: {err}")))
}
