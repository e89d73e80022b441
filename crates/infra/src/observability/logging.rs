//! Tracing subscriber setup.

use plansync_domain::{LogFormat, LoggingConfig, PlanSyncError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level` when set. Returns `Ok(false)` when a
/// global subscriber was already installed.
///
/// # Errors
/// `PlanSyncError::Config` when the effective filter does not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<bool> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(from_env.as_deref(), &config.level)?;

    let layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> =
        vec![build_stderr_layer(config.format), Box::new(filter)];

    match Registry::default().with(layers).try_init() {
        Ok(()) => {
            tracing::debug!(level = %config.level, format = %config.format, "tracing initialised");
            Ok(true)
        }
        Err(err) => {
            tracing::debug!(error = %err, "tracing already initialised");
            Ok(false)
        }
    }
}

fn build_filter(from_env: Option<&str>, level: &str) -> Result<EnvFilter> {
    let directives = from_env.filter(|value| !value.trim().is_empty()).unwrap_or(level);
    EnvFilter::try_new(directives)
        .map_err(|err| PlanSyncError::Config(format!("invalid log filter {directives:?}: {err}")))
}

fn build_stderr_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Pretty => Box::new(
            tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr).with_target(true),
        ),
        LogFormat::Compact => Box::new(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(true),
        ),
        LogFormat::Json => Box::new(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        ),
    }
}
