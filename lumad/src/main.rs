//! Luma Daemon
//!
//! Adaptive risk and execution controller for Hyperliquid perpetuals.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration (paper gateway, ./data)
//! cargo run -p lumad
//!
//! # JSON logs, custom instrument list
//! LUMA_LOG_JSON=1 LUMA_INSTRUMENTS=SOL:trend:2,WIF:volatile:0 cargo run -p lumad
//! ```
//!
//! # Environment Variables
//!
//! - `LUMA_ENV`: Environment (test, development, production)
//! - `LUMA_WALLET_ADDRESS`: Account to mirror (required)
//! - `LUMA_DATA_DIR`: State and dashboard directory (default: ./data)
//! - `LUMA_TICK_INTERVAL_SECS`: Sleep between ticks (default: 20)
//! - `LUMA_LOG_JSON`: Emit JSON logs when set to 1
//!
//! See `lumad::config` for the full list.

use lumad::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVES: [&str; 3] = ["lumad=info", "luma_engine=info", "luma_exec=info"];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let mut filter = EnvFilter::from_default_env();
    for directive in DEFAULT_DIRECTIVES {
        filter = filter.add_directive(directive.parse()?);
    }
    let json = std::env::var("LUMA_LOG_JSON").is_ok_and(|v| v == "1");
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    // Load configuration
    let config = Config::from_env()?;
    if config.wallet_address.is_empty() {
        anyhow::bail!("LUMA_WALLET_ADDRESS must be set");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        wallet = %config.wallet_address,
        data_dir = %config.data_dir.display(),
        "Luma Daemon"
    );

    // Create and run daemon
    let daemon = Daemon::paper(config)?;
    daemon.run().await?;

    Ok(())
}
