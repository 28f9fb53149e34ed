//! echo-gate: An authenticated echo server
//!
//! Clients log in with a fixed-width username/password pair, then exchange
//! echo frames whose payloads travel obfuscated under a keystream cipher
//! keyed by the session credentials and a per-frame sequence number.
//!
//! Features:
//! - Binary frame protocol: login and echo over TCP
//! - Per-connection sessions bound to the login credentials
//! - mio readiness loop with SO_REUSEPORT worker threads
//! - Configuration via CLI arguments or TOML file

mod config;
mod protocol;
mod runtime;

use config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        workers = ?config.workers,
        max_connections = config.max_connections,
        "Starting echo-gate server"
    );

    runtime::run(config)?;
    Ok(())
}
