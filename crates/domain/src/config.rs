//! Configuration structures
//!
//! Loading (environment first, then file) lives in `plansync-infra`; this
//! module only describes the shape and the invariants of a valid config.

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_RECONNECT_DELAYS_MS;
use crate::errors::{PlanSyncError, Result};

/// Top-level configuration for a PlanSync client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSyncConfig {
    pub api: ApiConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PlanSyncConfig {
    /// Check cross-field invariants after loading.
    ///
    /// # Errors
    /// Returns `PlanSyncError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(PlanSyncError::Config("api.base_url must not be empty".into()));
        }
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            return Err(PlanSyncError::Config(format!(
                "api.base_url must be an http(s) URL: {}",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(PlanSyncError::Config("api.timeout_secs must be positive".into()));
        }
        if self.api.read_attempts == 0 {
            return Err(PlanSyncError::Config("api.read_attempts must be at least 1".into()));
        }
        if self.session.user_name.trim().is_empty() {
            return Err(PlanSyncError::Config("session.user_name must not be empty".into()));
        }
        Ok(())
    }
}

/// Persisted-store HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL; routes are appended as `<base_url>/api/<op>`.
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts for idempotent reads (`getPlan`, `negotiate`). Mutations are
    /// never retried.
    #[serde(default = "default_read_attempts")]
    pub read_attempts: u32,
}

/// Per-participant session behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Identity attached to every mutation as `byUser`.
    pub user_name: String,
    /// Re-fetch the whole plan after the transport reconnects.
    #[serde(default = "default_true")]
    pub resync_on_reconnect: bool,
    /// Re-fetch the whole plan after a persistence call fails.
    #[serde(default = "default_true")]
    pub resync_on_failure: bool,
    #[serde(default = "default_reconnect_delays")]
    pub reconnect_delays_ms: Vec<u64>,
}

impl SessionConfig {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            resync_on_reconnect: true,
            resync_on_failure: true,
            reconnect_delays_ms: default_reconnect_delays(),
        }
    }
}

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    #[default]
    Compact,
    Json,
}

crate::impl_wire_name_conversions!(LogFormat {
    Pretty => "pretty",
    Compact => "compact",
    Json => "json",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: LogFormat::default() }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_read_attempts() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_reconnect_delays() -> Vec<u64> {
    DEFAULT_RECONNECT_DELAYS_MS.to_vec()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PlanSyncConfig {
        PlanSyncConfig {
            api: ApiConfig {
                base_url: "https://plans.example".into(),
                timeout_secs: 10,
                read_attempts: 2,
            },
            session: SessionConfig::new("alice"),
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let config: PlanSyncConfig = serde_json::from_str(
            r#"{"api":{"base_url":"http://localhost:7071"},"session":{"user_name":"bob"}}"#,
        )
        .unwrap();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.read_attempts, 3);
        assert!(config.session.resync_on_reconnect);
        assert_eq!(config.session.reconnect_delays_ms, vec![0, 2_000, 10_000, 30_000]);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_fields() {
        let mut config = valid();
        config.api.base_url = "ftp://nope".into();
        assert!(matches!(config.validate(), Err(PlanSyncError::Config(_))));

        let mut config = valid();
        config.api.read_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.session.user_name = "   ".into();
        assert!(config.validate().is_err());

        assert!(valid().validate().is_ok());
    }

    #[test]
    fn log_format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
