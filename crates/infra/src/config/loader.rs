//! Configuration loader
//!
//! Loads client configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. A `.env` file in the working directory (if any) is merged into the
//!    process environment
//! 2. Environment variables are tried first
//! 3. If a required variable is missing, a probed config file is loaded
//! 4. JSON and TOML are supported, picked by file extension
//!
//! ## Environment Variables
//! - `PLANSYNC_API_BASE_URL` (required): store base URL
//! - `PLANSYNC_USER_NAME` (required): identity attached to mutations
//! - `PLANSYNC_API_TIMEOUT_SECS`: per-request timeout
//! - `PLANSYNC_API_READ_ATTEMPTS`: attempts for `getPlan` / `negotiate`
//! - `PLANSYNC_RESYNC_ON_RECONNECT`, `PLANSYNC_RESYNC_ON_FAILURE`: true/false
//! - `PLANSYNC_RECONNECT_DELAYS_MS`: comma separated delays
//! - `PLANSYNC_LOG_LEVEL`, `PLANSYNC_LOG_FORMAT`
//!
//! ## File Locations
//! `plansync.{json,toml}` then `config.{json,toml}`, looked up in the working
//! directory, its parent, and next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use plansync_domain::{
    ApiConfig, LogFormat, LoggingConfig, PlanSyncConfig, PlanSyncError, Result, SessionConfig,
};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["plansync.json", "plansync.toml", "config.json", "config.toml"];

/// Load and validate configuration, environment first.
///
/// # Errors
/// Returns `PlanSyncError::Config` if neither source yields a valid config.
pub fn load() -> Result<PlanSyncConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = %e, "Environment incomplete, trying config file");
            load_from_file(None)?
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from `PLANSYNC_*` environment variables.
///
/// # Errors
/// Returns `PlanSyncError::Config` if a required variable is missing or a
/// value does not parse.
pub fn load_from_env() -> Result<PlanSyncConfig> {
    let base_url = env_var("PLANSYNC_API_BASE_URL")?;
    let user_name = env_var("PLANSYNC_USER_NAME")?;

    let defaults = default_config(base_url, user_name);
    let mut config = defaults.clone();

    config.api.timeout_secs =
        env_parse("PLANSYNC_API_TIMEOUT_SECS")?.unwrap_or(defaults.api.timeout_secs);
    config.api.read_attempts =
        env_parse("PLANSYNC_API_READ_ATTEMPTS")?.unwrap_or(defaults.api.read_attempts);

    config.session.resync_on_reconnect =
        env_bool("PLANSYNC_RESYNC_ON_RECONNECT", defaults.session.resync_on_reconnect);
    config.session.resync_on_failure =
        env_bool("PLANSYNC_RESYNC_ON_FAILURE", defaults.session.resync_on_failure);
    if let Ok(raw) = std::env::var("PLANSYNC_RECONNECT_DELAYS_MS") {
        config.session.reconnect_delays_ms = parse_delays(&raw)?;
    }

    if let Ok(level) = std::env::var("PLANSYNC_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.format =
        env_parse::<LogFormat>("PLANSYNC_LOG_FORMAT")?.unwrap_or(defaults.logging.format);

    Ok(config)
}

/// Load configuration from a file, probing standard locations when `path`
/// is `None`.
///
/// # Errors
/// Returns `PlanSyncError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<PlanSyncConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(PlanSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            PlanSyncError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| PlanSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<PlanSyncConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| PlanSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| PlanSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(PlanSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file, or `None`.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join(".."));
        dirs.insert(0, cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

fn default_config(base_url: String, user_name: String) -> PlanSyncConfig {
    PlanSyncConfig {
        api: ApiConfig { base_url, timeout_secs: 30, read_attempts: 3 },
        session: SessionConfig::new(user_name),
        logging: LoggingConfig::default(),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| PlanSyncError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an optional variable; `Ok(None)` when unset.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| PlanSyncError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_delays(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u64>().map_err(|e| {
                PlanSyncError::Config(format!("Invalid reconnect delay {part:?}: {e}"))
            })
        })
        .collect()
}
