use anyhow::{Context, Result};
use ledger::{init_tracing, FeedKind, LedgerConfig, LedgerEngine, LedgerView, ShutdownManager};
use ledger_sync::bin_common::{
    load_config_from_env, parse_args, BinaryRunner, ConfigType, ReconnectGate, RunConfig,
};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

struct LedgerMonitor {
    run_config: RunConfig,
    ledger_config: LedgerConfig,
    shutdown: ShutdownManager,
}

impl LedgerMonitor {
    fn summarize(view: &LedgerView) -> String {
        format!(
            "rev={} open={} history_groups={} feed={} prices={} highlights={}",
            view.revision,
            view.open_orders.len(),
            view.history.len(),
            view.feed.len(),
            view.prices.len(),
            view.highlights.len()
        )
    }
}

impl BinaryRunner for LedgerMonitor {
    async fn run(&mut self) -> Result<Option<String>> {
        let handle = LedgerEngine::start(&self.ledger_config).await?;
        let poll = Duration::from_secs_f64(self.run_config.poll_interval_secs);
        let heartbeat = Duration::from_secs(self.run_config.heartbeat_interval_secs);
        let mut reconnects =
            ReconnectGate::new(Duration::from_secs(self.run_config.reconnect_cooldown_secs));

        let mut last_revision = 0;
        let mut last_beat = Instant::now();

        while self.shutdown.is_running() {
            let view = handle.view();
            if view.revision != last_revision {
                last_revision = view.revision;
                info!("Ledger updated: {}", Self::summarize(&view));
            }

            if let Some(states) = handle.feed_states() {
                for kind in states.exhausted() {
                    if !reconnects.allow(kind, Instant::now()) {
                        continue;
                    }
                    warn!("[{}] Out of retries, requesting a reconnect", kind.label());
                    if let Err(e) = handle.reconnect_feed(kind) {
                        error!("[{}] Reconnect request failed: {}", kind.label(), e);
                    }
                }

                if last_beat.elapsed() >= heartbeat {
                    info!("Heartbeat: {}", states);
                    for kind in FeedKind::ALL {
                        if let Some(metrics) = handle.feed_metrics(kind) {
                            info!(
                                "[{}] messages={} parse_failures={} reconnects={}",
                                kind.label(),
                                metrics.messages_received,
                                metrics.parse_failures,
                                metrics.reconnect_count
                            );
                        }
                    }
                    last_beat = Instant::now();
                }
            }

            self.shutdown.interruptible_sleep(poll).await;
        }

        let summary = Self::summarize(&handle.view());
        handle.shutdown().await?;
        Ok(Some(summary))
    }

    fn config(&self) -> &RunConfig {
        &self.run_config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load config first (before logging is initialized)
    let config_type = ConfigType::from_args(&parse_args(), ConfigType::Ledger);
    let config_path = load_config_from_env(config_type);
    let ledger_config = LedgerConfig::from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_tracing(&ledger_config.log_level);
    ledger_config.log();

    let shutdown = ShutdownManager::new();
    shutdown.spawn_signal_handler();

    let mut monitor = LedgerMonitor {
        run_config: RunConfig::new("Ledger Monitor"),
        ledger_config,
        shutdown,
    };
    monitor.execute().await
}
