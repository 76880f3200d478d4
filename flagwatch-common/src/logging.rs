//! Tracing setup shared by the daemon and the CLI.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies.
//! Output goes through a non-blocking writer whose guard must outlive `main`.

use crate::config::EnvParser;
use anyhow::{Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    /// Write to stderr instead of stdout.
    pub stderr: bool,
}

impl LogConfig {
    /// Read `FLAGWATCH_LOG_LEVEL` and `FLAGWATCH_LOG_FORMAT`.
    pub fn from_env(default_level: &str) -> Self {
        let mut parser = EnvParser::flagwatch();
        let level = parser.get_log_level("LOG_LEVEL", default_level).value;
        let format = LogFormat::parse(&parser.get_choice("LOG_FORMAT", "text", &["text", "json"]).value);
        for err in parser.take_errors() {
            eprintln!("warning: {err}");
        }
        Self {
            level,
            format,
            stderr: false,
        }
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Keeps the background log writer alive.
pub struct LoggingGuards {
    _writer: WorkerGuard,
}

/// Install the global subscriber.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards> {
    let (writer, guard) = if config.stderr {
        tracing_appender::non_blocking(std::io::stderr())
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    let registry = tracing_subscriber::registry().with(config.filter());
    let installed = match config.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(writer))
            .try_init(),
    };
    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(LoggingGuards { _writer: guard })
}
