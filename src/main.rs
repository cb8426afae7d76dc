use anyhow::{Context, Result};
use rum_agent::kernel::host::{FileStorage, PageContext, SystemHost};
use rum_agent::kernel::source::{Signal, SignalChannel, SignalKind};
use rum_agent::{Agent, AgentConfig, FlushOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const ALL_KINDS: [SignalKind; 9] = [
    SignalKind::WebVitals,
    SignalKind::Errors,
    SignalKind::NetworkErrors,
    SignalKind::Engagement,
    SignalKind::ResourceTiming,
    SignalKind::UserActions,
    SignalKind::ConsoleLogs,
    SignalKind::LongTasks,
    SignalKind::CspViolations,
];

// Replays newline-delimited JSON signals from stdin through a live agent.
//
//   RUM_PAGE_URL=https://shop.example/cart rum-agent config.json < signals.ndjson
#[tokio::main]
async fn main() -> Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    // 2. Config + Host
    let config_path = std::env::args()
        .nth(1)
        .context("usage: rum-agent <config.json>")?;
    let config = AgentConfig::from_file(&config_path)?;

    let page_url = std::env::var("RUM_PAGE_URL").unwrap_or_else(|_| "about:blank".to_string());
    let page_path = reqwest::Url::parse(&page_url)
        .map(|url| url.path().to_string())
        .unwrap_or_default();
    let storage_path = std::env::var("RUM_STORAGE").unwrap_or_else(|_| ".rum_storage.json".to_string());
    let storage = FileStorage::open(storage_path.into()).context("opening identity storage")?;

    let host = SystemHost::new(PageContext {
        url: page_url,
        path: page_path,
        title: String::new(),
        referrer: None,
    })
    .with_user_agent(format!("rum-agent/{}", env!("CARGO_PKG_VERSION")))
    .with_storage(storage);

    // 3. One push channel per observation kind
    let channels: HashMap<SignalKind, SignalChannel> = ALL_KINDS
        .iter()
        .map(|kind| (*kind, SignalChannel::new(*kind)))
        .collect();

    let mut builder = Agent::builder(config).host(Arc::new(host));
    for channel in channels.values() {
        builder = builder.source(Arc::new(channel.clone()));
    }
    let agent = builder.build()?;
    agent.start();
    tracing::info!(session_id = %agent.session_id(), "Replaying signals from stdin...");

    // 4. Replay
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Signal>(line) {
            Ok(signal) => {
                let delivered = channels
                    .get(&signal.kind())
                    .map(|channel| channel.emit(signal))
                    .unwrap_or(false);
                if !delivered {
                    tracing::debug!("signal kind not enabled, dropped");
                }
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed signal line"),
        }
    }

    // 5. Drain
    agent.stop();
    agent.settle().await;
    if agent.queue_len() > 0 {
        match agent.flush().await {
            FlushOutcome::Failed(n) => tracing::warn!(events = n, "final flush failed, events lost"),
            outcome => tracing::debug!(?outcome, "final flush"),
        }
    }

    let stats = agent.stats();
    tracing::info!(
        delivered = stats.delivered_events,
        failed_flushes = stats.failed_flushes,
        dropped = stats.dropped_events,
        "Replay finished"
    );
    Ok(())
}
