//! Daemon: main runtime loop.
//!
//! # Lifecycle
//!
//! 1. Restore persisted state
//! 2. Tick, then sleep the tick interval
//! 3. Repeat until the shutdown token is cancelled or Ctrl-C arrives
//! 4. Persist state and exit
//!
//! A tick always runs to completion; shutdown is only observed between ticks.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use luma_connectors::{HyperliquidConfig, HyperliquidInfoClient};
use luma_exec::{ExecutionGateway, IndicatorProvider, StubGateway};
use luma_store::{JsonFileStore, StateRepository};

use crate::config::Config;
use crate::controller::Controller;
use crate::error::DaemonResult;
use crate::snapshot::{JsonFileSink, SnapshotSink};

// =============================================================================
// Daemon
// =============================================================================

/// The Luma daemon.
pub struct Daemon<P, G, S>
where
    P: IndicatorProvider,
    G: ExecutionGateway,
    S: StateRepository,
{
    controller: Controller<P, G, S>,
    shutdown: CancellationToken,
}

impl Daemon<HyperliquidInfoClient, StubGateway, JsonFileStore> {
    /// Production wiring: live Hyperliquid data, paper gateway, JSON files
    /// in the data directory.
    ///
    /// # Errors
    ///
    /// Returns `DaemonError::Engine` if any engine component rejects its
    /// configuration.
    pub fn paper(config: Config) -> DaemonResult<Self> {
        let provider = Arc::new(HyperliquidInfoClient::new(HyperliquidConfig {
            info_url: config.info_url.clone(),
            request_timeout: config.call_timeout,
            ..HyperliquidConfig::default()
        }));
        let gateway = Arc::new(StubGateway::new());
        let store = Arc::new(JsonFileStore::in_dir(&config.data_dir));
        let sink: Arc<dyn SnapshotSink> = Arc::new(JsonFileSink::in_dir(&config.data_dir));

        let controller = Controller::new(config, provider, gateway, store, sink)?;
        Ok(Self::new(controller))
    }
}

impl<P, G, S> Daemon<P, G, S>
where
    P: IndicatorProvider,
    G: ExecutionGateway,
    S: StateRepository,
{
    /// Wrap an assembled controller.
    pub fn new(controller: Controller<P, G, S>) -> Self {
        Self {
            controller,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the loop after the current tick when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn controller(&self) -> &Controller<P, G, S> {
        &self.controller
    }

    /// Run until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Only a failed restore is fatal. Tick failures are logged and the
    /// loop keeps going.
    pub async fn run(mut self) -> DaemonResult<Controller<P, G, S>> {
        let config = self.controller.config();
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %config.environment,
            instruments = config.instruments.len(),
            interval = ?config.tick_interval,
            "Starting Luma daemon"
        );
        let interval = config.tick_interval;

        self.controller.restore(Utc::now()).await?;

        let mut ticks: u64 = 0;
        loop {
            ticks += 1;
            if let Err(e) = self.controller.tick().await {
                error!(tick = ticks, error = %e, "Tick failed, retrying after interval");
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.controller.persist(Utc::now()).await;
        info!(ticks, "Luma daemon stopped");
        Ok(self.controller)
    }
}
