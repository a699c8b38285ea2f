// ============================================
// File: crates/orbitguard-server/src/main.rs
// ============================================
//! # OrbitGuard Relay Entry Point
//!
//! ## Creation Reason
//! Main entry point for the relay binary. Handles CLI parsing, logging
//! setup and server start.
//!
//! ## Usage
//! ```bash
//! orbitguard keygen                          # Print a fresh shared key
//! orbitguard validate --config relay.toml   # Check a config file
//! orbitguard start --config relay.toml      # Run until Ctrl+C
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The shared key can come from the config file or ORBITGUARD_SHARED_KEY;
//!   the environment wins
//! - Never print the resolved key outside `keygen`
//! - Logging starts at `info` and switches to `[logging] level` once the
//!   config is loaded; `RUST_LOG` overrides both
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use orbitguard_core::crypto::SharedKey;
use orbitguard_server::config::SHARED_KEY_ENV;
use orbitguard_server::{Server, ServerConfig};

const DEFAULT_CONFIG: &str = "/etc/orbitguard/relay.toml";

type LogHandle = reload::Handle<EnvFilter, Registry>;

// ============================================
// CLI Definition
// ============================================

/// OrbitGuard satellite relay
#[derive(Parser, Debug)]
#[command(name = "orbitguard")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the relay
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Generate a new shared key
    Keygen,
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging = init_logging("info");

    let result = match cli.command {
        Commands::Start { config } => cmd_start(&config, logging.as_ref()).await,
        Commands::Validate { config } => cmd_validate(&config, logging.as_ref()).await,
        Commands::Keygen => {
            cmd_keygen();
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Starts the relay.
async fn cmd_start(config_path: &Path, logging: Option<&LogHandle>) -> anyhow::Result<()> {
    let config = load_or_default_config(config_path).await?;
    apply_log_level(logging, &config.logging.level);

    let key = config.shared_key()?;

    info!("════════════════════════════════════════");
    info!("Listen:      {}", config.network.listen_addr);
    info!("Downstream:  {}", config.downstream.addr);
    info!(
        "Flood:       {} per {}ms",
        config.limits.flood_threshold, config.limits.flood_window_ms
    );
    info!("════════════════════════════════════════");

    let server = Server::new(config, key);
    server.run().await?;

    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: &Path, logging: Option<&LogHandle>) -> anyhow::Result<()> {
    if !config_path.exists() {
        println!("⚠️  Config file not found: {}", config_path.display());
        println!("   Relay will use default values.");
        return Ok(());
    }

    let config = ServerConfig::load(config_path).await?;
    apply_log_level(logging, &config.logging.level);
    let key_status = match config.shared_key() {
        Ok(_) if std::env::var(SHARED_KEY_ENV).is_ok() => format!("✅ from {SHARED_KEY_ENV}"),
        Ok(_) => "✅ from config".to_string(),
        Err(e) => format!("❌ {e}"),
    };

    println!("✅ Configuration is valid");
    println!();
    println!("Network:");
    println!("   Listen:       {}", config.network.listen_addr);
    println!("   Downstream:   {}", config.downstream.addr);
    println!("   Attempts:     {}", config.downstream.max_attempts);
    println!();
    println!("Crypto:");
    println!("   Shared Key:   {key_status}");
    println!();
    println!("Limits:");
    println!(
        "   Flood:        {} per {}ms",
        config.limits.flood_threshold, config.limits.flood_window_ms
    );
    println!("   Read Timeout: {}ms", config.limits.read_timeout_ms);
    println!("   Max Message:  {} bytes", config.limits.max_message_size);
    println!("   Connections:  {}", config.limits.max_connections);
    println!();
    println!("Policy:");
    println!("   Block on anomaly:             {}", config.policy.block_on_anomaly);
    println!(
        "   Block on signature mismatch:  {}",
        config.policy.block_on_signature_mismatch
    );
    println!(
        "   Escalate data anomalies:      {}",
        config.policy.escalate_data_anomalies
    );
    println!();
    if let Some(path) = &config.alerts.persist_path {
        println!("Alerts:");
        println!("   Persist:      {}", path.display());
        println!();
    }

    Ok(())
}

/// Prints a freshly generated shared key.
fn cmd_keygen() {
    let key = SharedKey::generate();
    println!("{}", key.to_base64());
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber.
///
/// Returns a handle for swapping the level filter later, or `None` if a
/// global subscriber was already installed.
fn init_logging(level: &str) -> Option<LogHandle> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .ok()
        .map(|()| handle)
}

/// Switches to the configured level unless `RUST_LOG` is set.
fn apply_log_level(logging: Option<&LogHandle>, level: &str) {
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
        return;
    }
    if let Some(handle) = logging {
        if let Err(e) = set_log_level(handle, level) {
            warn!("Failed to apply log level '{}': {}", level, e);
        }
    }
}

fn set_log_level(handle: &LogHandle, level: &str) -> Result<(), reload::Error> {
    handle.reload(EnvFilter::new(level))
}

/// Loads config, or defaults when the file does not exist.
async fn load_or_default_config(path: &Path) -> anyhow::Result<ServerConfig> {
    if path.exists() {
        Ok(ServerConfig::load(path).await?)
    } else {
        info!("Config file not found, using defaults");
        Ok(ServerConfig::default())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_configured_level_replaces_startup_level() {
        let handle = init_logging("info").unwrap();

        set_log_level(&handle, "trace").unwrap();
        assert!(tracing::enabled!(Level::TRACE));

        set_log_level(&handle, "warn").unwrap();
        assert!(!tracing::enabled!(Level::INFO));
        assert!(tracing::enabled!(Level::WARN));
    }
}
