//! flagwatch CLI: one-shot flag checks and a terminal status watcher.
#![forbid(unsafe_code)]

mod watch;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flagwatch_common::present::terminal_line;
use flagwatch_common::{
    FlagEvaluator, FlagwatchConfig, HttpTransport, LogConfig, LogFormat, StatusView, init_logging,
};
use std::time::Duration;
use tracing::{debug, info, warn};

use watch::{DaemonSource, WatchConfig};

#[derive(Parser)]
#[command(name = "flagwatch", version, about = "Feature flag status from Flipt")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Flipt base URL (overrides FLIPT_URL)
    #[arg(long, global = true)]
    flipt_url: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log line format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the flags once and print the status document
    Check {
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Poll for status and print a line whenever it changes
    Watch {
        /// flagwatchd base URL to poll
        #[arg(long, env = "FLAGWATCH_DAEMON_URL", default_value = "http://localhost:8080")]
        daemon_url: String,

        /// Evaluate against Flipt directly instead of polling flagwatchd
        #[arg(long)]
        direct: bool,

        /// Milliseconds between polls
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(10..))]
        interval_ms: u64,

        /// Stop after this many polls
        #[arg(long)]
        count: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    Json,
    Pretty,
    Text,
}

#[derive(ValueEnum, Clone, Copy)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("warn").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format.into());
    }
    let _logging_guards = init_logging(&log_config)?;

    match cli.command {
        Commands::Check { format } => {
            let evaluator = build_evaluator(cli.flipt_url)?;
            let snapshot = evaluator.snapshot().await;
            let output = match format {
                OutputFormat::Json => serde_json::to_string(&StatusView::from_snapshot(&snapshot))?,
                OutputFormat::Pretty => {
                    serde_json::to_string_pretty(&StatusView::from_snapshot(&snapshot))?
                }
                OutputFormat::Text => terminal_line(&snapshot),
            };
            println!("{}", output);
        }
        Commands::Watch {
            daemon_url,
            direct,
            interval_ms,
            count,
        } => {
            let config = WatchConfig {
                interval: Duration::from_millis(interval_ms),
                max_ticks: count,
            };
            let mut stdout = std::io::stdout();
            if direct {
                let evaluator = build_evaluator(cli.flipt_url)?;
                info!("Watching {} directly", evaluator.settings().base_url);
                watch::watch(evaluator, config, &mut stdout).await?;
            } else {
                // Timeout follows the interval, never below 500ms.
                let timeout = Duration::from_millis(interval_ms.max(500));
                let source = DaemonSource::new(&daemon_url, timeout)
                    .context("Failed to build HTTP client")?;
                info!("Watching {}", source.status_url());
                watch::watch(source, config, &mut stdout).await?;
            }
        }
    }

    Ok(())
}

fn build_evaluator(flipt_url: Option<String>) -> Result<FlagEvaluator<HttpTransport>> {
    let (mut config, env_errors) = FlagwatchConfig::from_env();
    for err in &env_errors {
        warn!("Ignoring invalid setting: {}", err);
    }
    if let Some(url) = flipt_url {
        config = config.with_flipt_url(url);
    }
    for (name, value, origin) in config.describe() {
        debug!("{} = {} ({})", name, value, origin);
    }

    let transport = HttpTransport::new(config.timeout()).context("Failed to build HTTP client")?;
    Ok(FlagEvaluator::new(transport, config.evaluation_settings()))
}
