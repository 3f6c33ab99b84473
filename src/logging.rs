// src/logging.rs

//! Structured logging setup
//!
//! Installs a `tracing` subscriber with:
//! - An env-overridable level filter (`RUST_LOG` wins over configuration)
//! - Console output with optional ANSI colors
//! - Optional daily-rolling file output in JSON, pretty or compact format

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::Identity;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};
use uuid::Uuid;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result, ResultExt};

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Owns the subscriber configuration and the non-blocking writer guards
#[derive(Debug)]
pub struct LoggingManager {
    config: LoggingConfig,
    initialized: bool,
    _guards: Vec<WorkerGuard>,
}

impl LoggingManager {
    pub fn new(config: LoggingConfig) -> Self {
        Self {
            config,
            initialized: false,
            _guards: Vec::new(),
        }
    }

    /// Overrides the configured level, typically from a `--verbose` flag
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.config.level = level.as_filter().to_string();
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Installs the global subscriber. A subscriber that is already installed
    /// (tests, embedding applications) is left in place.
    pub async fn initialize(&mut self) -> Result<()> {
        if let Some(file_config) = &self.config.file {
            if let Some(parent) = file_config.path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
            }
        }

        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.config.level))
            .map_err(|e| Error::config(format!("Invalid log level '{}': {}", self.config.level, e)))?;

        let registry = Registry::default().with(filter);

        let registry = if self.config.console.enabled {
            let console_layer = fmt::layer()
                .with_ansi(self.config.console.colored)
                .with_target(true)
                .with_writer(std::io::stderr)
                .boxed();
            registry.with(console_layer)
        } else {
            registry.with(Identity::new().boxed())
        };

        let registry = if let Some(file_config) = &self.config.file {
            let file_appender = tracing_appender::rolling::daily(
                file_config.path.parent().unwrap_or_else(|| std::path::Path::new(".")),
                file_config
                    .path
                    .file_name()
                    .unwrap_or_else(|| std::ffi::OsStr::new("catalog-admin.log")),
            );

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            self._guards.push(guard);

            let file_layer = match self.config.format {
                LogFormat::Json => fmt::layer().json().with_writer(non_blocking).boxed(),
                LogFormat::Pretty => fmt::layer().pretty().with_writer(non_blocking).boxed(),
                LogFormat::Compact => fmt::layer().compact().with_writer(non_blocking).boxed(),
            };
            registry.with(file_layer)
        } else {
            registry.with(Identity::new().boxed())
        };

        if registry.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already installed");
        }

        self.initialized = true;
        tracing::info!(level = %self.config.level, "Logging initialized");
        Ok(())
    }

    /// Drops the writer guards, flushing buffered file output
    pub fn shutdown(&mut self) {
        tracing::debug!("Shutting down logging");
        self._guards.clear();
        self.initialized = false;
    }

    pub fn create_logger(&self, component: impl Into<String>) -> Logger {
        Logger::new(component.into())
    }
}

/// Component-specific logger with context
#[derive(Debug, Clone)]
pub struct Logger {
    component: String,
    correlation_id: Option<Uuid>,
    metadata: HashMap<String, serde_json::Value>,
}

impl Logger {
    pub fn new(component: String) -> Self {
        Self {
            component,
            correlation_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Set correlation ID for all logs from this logger
    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Add metadata that will be included in all logs
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message.as_ref());
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message.as_ref());
    }

    fn log(&self, level: LogLevel, message: &str) {
        let correlation = self
            .correlation_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let metadata = if self.metadata.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&self.metadata).unwrap_or_default()
        };

        match level {
            LogLevel::Trace => tracing::trace!(component = %self.component, correlation_id = %correlation, metadata = %metadata, "{}", message),
            LogLevel::Debug => tracing::debug!(component = %self.component, correlation_id = %correlation, metadata = %metadata, "{}", message),
            LogLevel::Info => tracing::info!(component = %self.component, correlation_id = %correlation, metadata = %metadata, "{}", message),
            LogLevel::Warn => tracing::warn!(component = %self.component, correlation_id = %correlation, metadata = %metadata, "{}", message),
            LogLevel::Error => tracing::error!(component = %self.component, correlation_id = %correlation, metadata = %metadata, "{}", message),
        }
    }
}
