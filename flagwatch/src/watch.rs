//! Terminal status watcher.
//!
//! A ticker spawns one fetch per interval. Fetches never wait for each other;
//! whichever finishes first is reported first. Results flow through a channel
//! into a single consumer that owns the [`TransitionLog`] and prints a line
//! for each status change.

use chrono::{DateTime, Utc};
use flagwatch_common::errors::error_chain;
use flagwatch_common::present::terminal_line;
use flagwatch_common::{
    CanonicalFlagState, EvaluationTransport, FlagEvaluator, StatusView, TransitionLog,
    VariantValue,
};
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, info};

/// Default time between polls.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Something that can be asked for the current status.
///
/// Implementations never fail; problems come back as an `ERROR` view.
pub trait StatusSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = StatusView> + Send;
}

/// Polls a running flagwatchd over HTTP.
pub struct DaemonSource {
    client: reqwest::Client,
    status_url: String,
}

impl DaemonSource {
    pub fn new(daemon_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            status_url: format!("{}/feature-status", daemon_url.trim_end_matches('/')),
        })
    }

    pub fn status_url(&self) -> &str {
        &self.status_url
    }

    async fn try_fetch(&self) -> reqwest::Result<StatusView> {
        self.client
            .get(&self.status_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?
            .json::<StatusView>()
            .await
    }
}

impl StatusSource for DaemonSource {
    async fn fetch(&self) -> StatusView {
        match self.try_fetch().await {
            Ok(view) => view,
            Err(err) => {
                debug!(url = %self.status_url, "Status fetch failed: {}", error_chain(&err));
                failed_fetch_view(&err)
            }
        }
    }
}

/// Evaluates the flags directly, without a daemon in between.
impl<T> StatusSource for FlagEvaluator<T>
where
    T: EvaluationTransport + 'static,
{
    async fn fetch(&self) -> StatusView {
        StatusView::from_snapshot(&self.snapshot().await)
    }
}

/// Only connect failures and timeouts count as unreachable. A daemon that
/// answers with an error status or a body that is not a status document is
/// reachable but misbehaving.
fn failed_fetch_view(err: &reqwest::Error) -> StatusView {
    let warning = if err.is_connect() || err.is_timeout() {
        format!("flagwatchd unreachable: {err}")
    } else {
        format!("flagwatchd returned an unexpected response: {err}")
    };
    let state = CanonicalFlagState::Error;
    StatusView {
        status: state.label().to_string(),
        color: state.color().to_string(),
        warning,
        box_color: VariantValue::fallback().to_string(),
    }
}

/// Poll settings.
#[derive(Debug, Clone, Copy)]
pub struct WatchConfig {
    pub interval: Duration,
    /// Stop after this many ticks. `None` runs until interrupted.
    pub max_ticks: Option<u64>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_ticks: None,
        }
    }
}

/// Spawn one fetch per tick, forwarding each result to `tx`.
///
/// Returns once `max_ticks` fetches have been spawned. Fetches still in
/// flight keep their own sender, so the channel closes only after the last
/// one completes.
pub async fn run_poller<S: StatusSource>(
    source: Arc<S>,
    config: WatchConfig,
    tx: mpsc::UnboundedSender<StatusView>,
) {
    let mut ticker = interval(config.interval);
    let mut spawned = 0u64;

    loop {
        if config.max_ticks.is_some_and(|max| spawned >= max) {
            break;
        }
        ticker.tick().await;
        if tx.is_closed() {
            break;
        }

        let source = source.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let view = source.fetch().await;
            // Receiver gone means we are shutting down.
            let _ = tx.send(view);
        });
        spawned += 1;
    }
    debug!("Poller stopped after {} ticks", spawned);
}

/// Drain `rx`, printing one line per transition.
///
/// Each result is stamped with `clock()` when it arrives, so printed
/// timestamps follow completion order.
pub async fn consume<W, C>(
    mut rx: mpsc::UnboundedReceiver<StatusView>,
    out: &mut W,
    mut clock: C,
) -> std::io::Result<TransitionLog>
where
    W: Write,
    C: FnMut() -> DateTime<Utc>,
{
    let mut log = TransitionLog::new();
    while let Some(view) = rx.recv().await {
        let mut snapshot = view.into_snapshot(clock());
        if let Some(entry) = log.record(&snapshot) {
            snapshot.observed_at = entry.timestamp;
            info!(state = %entry.state, "Flag status changed");
            writeln!(out, "{}", terminal_line(&snapshot))?;
            out.flush()?;
        } else {
            debug!(state = %snapshot.state, "Status unchanged");
        }
    }
    Ok(log)
}

/// Run poller and consumer until the poller finishes or Ctrl-C.
pub async fn watch<S, W>(source: S, config: WatchConfig, out: &mut W) -> std::io::Result<()>
where
    S: StatusSource,
    W: Write,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let poller = tokio::spawn(run_poller(Arc::new(source), config, tx));

    let result = tokio::select! {
        log = consume(rx, out, Utc::now) => log.map(|log| {
            debug!("Watcher finished with {} transitions", log.len());
        }),
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping watcher");
            Ok(())
        }
    };
    poller.abort();
    result
}
