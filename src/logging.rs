//! Logging setup
//!
//! Logs go to stderr so stdout stays free for the turn result. `RUST_LOG`
//! overrides the default filter, `LOG_FORMAT=json` switches to JSON lines and
//! `LOG_DIR` adds a daily rolling file.

use std::env;
use std::path::PathBuf;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_FILTER: &str = "gateway_agent_sdk=info,gateway_agent=info";
const LOG_FILE_PREFIX: &str = "gateway-agent.log";

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            json: false,
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let filter = lookup("RUST_LOG")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let json = lookup("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let log_dir = lookup("LOG_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self { filter, json, log_dir }
    }
}

/// Install the global subscriber from environment settings
///
/// Keep the returned guard alive for the life of the process, or buffered
/// file output is lost.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    init_logging_with(&LoggingConfig::from_env())
}

pub fn init_logging_with(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&config.filter)?;

    let (json_layer, text_layer) = if config.json {
        (Some(fmt::layer().json().with_writer(std::io::stderr)), None)
    } else {
        (None, Some(fmt::layer().with_writer(std::io::stderr)))
    };

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        "[Logging] Initialised (filter: {}, json: {}, file: {:?})",
        config.filter,
        config.json,
        config.log_dir
    );
    Ok(guard)
}
