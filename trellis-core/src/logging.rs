//! Logging bootstrap for applications embedding the container.
//!
//! The container itself only emits `tracing` events; installing a
//! subscriber is the host's choice. [`LoggingConfig`] mirrors the
//! configuration keys under `logging.*` and installs a
//! `tracing-subscriber` formatter.

use std::str::FromStr;

use serde::Deserialize;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Environment;
use crate::error::{ContainerError, ContainerResult};

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(ContainerError::store(format!("Invalid log level: {other}"))),
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact single-line output (default).
    Compact,
    /// Full format with target and thread info.
    Full,
    /// JSON lines.
    Json,
    /// Multi-line pretty output for development.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ContainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "full" => Ok(LogFormat::Full),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(ContainerError::store(format!("Invalid log format: {other}"))),
        }
    }
}

/// Subscriber configuration, bindable from `logging.*` properties.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub show_target: bool,
    /// Extra `EnvFilter` directives, e.g. `"trellis_core=debug"`.
    pub directives: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            show_target: false,
            directives: None,
        }
    }
}

impl LoggingConfig {
    /// Reads `logging.level`, `logging.format`, `logging.show-target` and
    /// `logging.directives` from the environment, falling back to defaults.
    pub fn from_environment(environment: &Environment) -> ContainerResult<Self> {
        let mut config = Self::default();
        if let Some(level) = environment.get_string("logging.level") {
            config.level = level.parse()?;
        }
        if let Some(format) = environment.get_string("logging.format") {
            config.format = format.parse()?;
        }
        config.show_target = environment.get_bool_or("logging.show-target", config.show_target);
        config.directives = environment.get_string("logging.directives");
        Ok(config)
    }

    fn env_filter(&self) -> EnvFilter {
        let level: Level = self.level.into();
        let mut filter = EnvFilter::new(level.to_string().to_lowercase());
        if let Some(directives) = &self.directives {
            for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                if let Ok(parsed) = directive.parse() {
                    filter = filter.add_directive(parsed);
                }
            }
        }
        filter
    }

    /// Installs the global subscriber. Safe to call more than once; later
    /// calls are no-ops.
    pub fn init(&self) {
        let builder = fmt()
            .with_env_filter(self.env_filter())
            .with_target(self.show_target);
        let result = match self.format {
            LogFormat::Compact => builder.compact().try_init(),
            LogFormat::Full => builder.try_init(),
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
        if result.is_err() {
            tracing::debug!("Global tracing subscriber was already installed");
        }
    }
}
