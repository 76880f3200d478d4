//! flagwatch daemon
//!
//! Serves a status page and a `/feature-status` endpoint. Every request
//! evaluates the watched flags against Flipt and reports the outcome as a
//! status document, degrading to an `ERROR` document when Flipt misbehaves.

#![forbid(unsafe_code)]

mod http_api;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use flagwatch_common::{
    FlagEvaluator, FlagwatchConfig, HttpTransport, LogConfig, LogFormat, RenderMode, init_logging,
};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{info, warn};

use http_api::HttpState;

#[derive(Parser)]
#[command(name = "flagwatchd")]
#[command(author, version, about = "flagwatch daemon - feature flag status page")]
struct Cli {
    /// Address to listen on
    #[arg(short, long, env = "FLAGWATCH_LISTEN", default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// How /feature-status is rendered
    #[arg(long, value_enum, default_value_t = RenderArg::Json)]
    render: RenderArg,

    /// Flipt base URL (overrides FLIPT_URL)
    #[arg(long)]
    flipt_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Log line format
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RenderArg {
    Json,
    Html,
}

impl From<RenderArg> for RenderMode {
    fn from(arg: RenderArg) -> Self {
        match arg {
            RenderArg::Json => RenderMode::Json,
            RenderArg::Html => RenderMode::Html,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
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

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format.into());
    }
    let _logging_guards = init_logging(&log_config)?;

    info!("Starting flagwatch daemon...");

    let (mut config, env_errors) = FlagwatchConfig::from_env();
    for err in &env_errors {
        warn!("Ignoring invalid setting: {}", err);
    }
    if let Some(url) = cli.flipt_url {
        config = config.with_flipt_url(url);
    }
    for (name, value, origin) in config.describe() {
        info!("{} = {} ({})", name, value, origin);
    }

    let transport = HttpTransport::new(config.timeout())?;
    let evaluator = FlagEvaluator::new(transport, config.evaluation_settings());

    let render_mode = RenderMode::from(cli.render);
    info!("Rendering /feature-status as {:?}", render_mode);

    let router = http_api::create_router(HttpState {
        evaluator,
        render_mode,
        version: env!("CARGO_PKG_VERSION"),
        started_at: Instant::now(),
    });

    http_api::serve(cli.listen, router).await?;
    info!("flagwatch daemon stopped");
    Ok(())
}
