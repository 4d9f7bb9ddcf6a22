//! # UAV Commander
//!
//! Runs the command executor against the simulated flight stack and serves
//! ground-client requests over UDP.
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO uav_commander: UAV Commander v0.1.0 starting...
//! INFO uav_commander::server: Command server bound to 0.0.0.0:5555
//! INFO uav_commander::executor::failsafe: Link watchdog armed, heartbeat timeout 10000 ms
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use uav_commander::config::{Config, LoggingConfig};
use uav_commander::executor::failsafe::LinkWatchdog;
use uav_commander::executor::{Executor, ExecutorSettings};
use uav_commander::gateway::sim::SimulatedGateway;
use uav_commander::gateway::FlightGateway;
use uav_commander::server::UdpServer;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Load the configuration, falling back to defaults when the file is absent
///
/// Returns the configuration and whether it came from the file.
fn load_config(path: &Path) -> Result<(Config, bool)> {
    if !path.exists() {
        return Ok((Config::default(), false));
    }
    let config = Config::load(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    Ok((config, true))
}

/// Install the console logger and, when a directory is configured, a
/// daily rolling file logger
///
/// `RUST_LOG` directives are layered on top of the configured level. The
/// returned guard must be held for the file writer to flush.
fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let level: tracing::Level = config
        .level
        .parse()
        .with_context(|| format!("invalid log level '{}'", config.level))?;
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let (file_layer, guard) = if config.directory.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&config.directory, &config.file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let (config, from_file) = load_config(&config_path)?;
    let _log_guard = init_logging(&config.logging)?;

    info!("UAV Commander v{} starting...", env!("CARGO_PKG_VERSION"));
    if from_file {
        info!("Loaded configuration from {}", config_path.display());
    } else {
        warn!("{} not found, using built-in defaults", config_path.display());
    }

    let gateway: Arc<dyn FlightGateway> = Arc::new(SimulatedGateway::new(config.simulator.clone()));
    let executor = Executor::new(gateway, ExecutorSettings::from(&config));

    if config.failsafe.enabled {
        let watchdog = LinkWatchdog::new(executor.clone(), config.failsafe.heartbeat_timeout());
        tokio::spawn(watchdog.run(executor.settings().tick));
    }

    let server = UdpServer::bind(
        &config.server.bind_addr,
        executor.clone(),
        config.server.max_datagram_size,
    )
    .await
    .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;

    info!("Press Ctrl+C to exit");

    tokio::select! {
        result = server.run() => {
            result.context("command server stopped")?;
        }

        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            executor.stop();
        }
    }

    info!(last_command = ?executor.last_command(), "Shutdown complete");
    Ok(())
}
