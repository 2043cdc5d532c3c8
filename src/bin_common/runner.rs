//! Binary runner utilities
//!
//! Provides a standardized way to run binaries with proper
//! logging, heartbeat, and graceful shutdown.

use tracing::info;

/// Configuration for running a binary application
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Name of the binary (for logging)
    pub name: String,
    /// Heartbeat interval in seconds
    pub heartbeat_interval_secs: u64,
    /// How often the main loop polls stream health
    pub poll_interval_secs: f64,
    /// Minimum spacing of explicit reconnect requests per stream
    pub reconnect_cooldown_secs: u64,
}

impl RunConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            heartbeat_interval_secs: 60,
            poll_interval_secs: 1.0,
            reconnect_cooldown_secs: 300,
        }
    }

    pub fn with_heartbeat(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    pub fn with_poll_interval(mut self, secs: f64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_reconnect_cooldown(mut self, secs: u64) -> Self {
        self.reconnect_cooldown_secs = secs;
        self
    }
}

/// Trait for binary applications
#[allow(async_fn_in_trait)]
pub trait BinaryRunner {
    /// Run the application main loop; returns a closing summary
    async fn run(&mut self) -> anyhow::Result<Option<String>>;

    /// Get the run configuration
    fn config(&self) -> &RunConfig;

    /// Print startup banner
    fn print_banner(&self) {
        let config = self.config();
        info!("");
        info!("========================================");
        info!("Starting {}", config.name);
        info!("Press Ctrl+C to stop");
        info!("========================================");
        info!("");
    }

    /// Print shutdown banner
    fn print_shutdown(&self, stats: Option<&str>) {
        let config = self.config();
        info!("");
        info!("========================================");
        info!("{} stopped gracefully", config.name);
        if let Some(stats) = stats {
            info!("{}", stats);
        }
        info!("========================================");
    }

    /// Execute the binary with proper initialization and cleanup
    async fn execute(&mut self) -> anyhow::Result<()> {
        self.print_banner();
        let stats = self.run().await?;
        self.print_shutdown(stats.as_deref());
        Ok(())
    }
}
