// ============================================
// File: crates/orbitguard-server/src/server.rs
// ============================================
//! # Server Orchestrator
//!
//! ## Creation Reason
//! Wires the relay services together and manages the listener lifecycle.
//!
//! ## Main Functionality
//! - `Server`: Owns the envelope handler and the shutdown machinery
//! - Accept loop with a connection cap
//! - One task per connection, panic-isolated
//! - Alert persister and periodic stats tasks
//! - Graceful shutdown with a bounded grace period
//!
//! ## Server Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Server                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  Accept Loop (permit ─► accept ─► spawn)            │    │
//! │  └──────────────────────────┬──────────────────────────┘    │
//! │                             ▼                               │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  Connection Task                                     │    │
//! │  │    read one message ─► EnvelopeHandler ─► Forwarder  │    │
//! │  │    (panics caught, recorded as PROCESSING_ERROR)     │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! │                                                             │
//! │  ┌──────────────────┐   ┌──────────────────┐                │
//! │  │ Alert Persister  │   │   Stats Task     │                │
//! │  └──────────────────┘   └──────────────────┘                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Shutdown Sequence
//! 1. Stop accepting, close the listener
//! 2. Wait up to the grace period for in-flight connections
//! 3. Stop the stats task
//! 4. Detach and drain the alert persister
//!
//! ## ⚠️ Important Note for Next Developer
//! - One bad connection must never end the accept loop
//! - Connection permits are held for the whole task; the grace period
//!   waits by reacquiring all of them
//!
//! ## Last Modified
//! v0.1.0 - Initial server implementation

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use orbitguard_common::time::SystemClock;
use orbitguard_common::types::SourceAddr;
use orbitguard_core::crypto::SharedKey;
use orbitguard_transport::{read_message, ConnectionSource, Outbound, TcpOutbound, TcpTransport};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::handlers::EnvelopeHandler;
use crate::services::{AlertLog, AlertPersister, RelayStats};

// ============================================
// Constants
// ============================================

/// How long in-flight connections get to finish after shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// How long the persister gets to drain.
const PERSIST_DRAIN: Duration = Duration::from_secs(5);

/// Interval between stats log lines.
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Pause after a failed accept.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

// ============================================
// Server
// ============================================

/// OrbitGuard relay server.
///
/// # Lifecycle
/// 1. Create with `Server::new(config, key)`
/// 2. Start with `server.run().await`
/// 3. Shutdown via Ctrl+C or `server.shutdown()`
pub struct Server {
    /// Server configuration.
    config: ServerConfig,
    /// Pipeline and shared relay state.
    handler: Arc<EnvelopeHandler>,
    /// Shutdown flag.
    shutdown: Arc<AtomicBool>,
    /// Shutdown signal sender.
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Creates a server forwarding over real TCP connections.
    #[must_use]
    pub fn new(config: ServerConfig, key: SharedKey) -> Self {
        let outbound = Arc::new(TcpOutbound::new(
            config.downstream.connect_timeout(),
            config.downstream.write_timeout(),
        ));
        Self::with_outbound(config, key, outbound)
    }

    /// Creates a server forwarding through `outbound`.
    #[must_use]
    pub fn with_outbound(config: ServerConfig, key: SharedKey, outbound: Arc<dyn Outbound>) -> Self {
        let handler = Arc::new(EnvelopeHandler::new(
            &config,
            key,
            outbound,
            Arc::new(SystemClock),
        ));
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            handler,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Returns the alert log.
    #[must_use]
    pub fn alerts(&self) -> &Arc<AlertLog> {
        self.handler.alerts()
    }

    /// Returns the relay counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<RelayStats> {
        self.handler.stats()
    }

    /// Returns the envelope handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<EnvelopeHandler> {
        &self.handler
    }

    /// Binds the configured address and serves until Ctrl+C.
    ///
    /// # Errors
    /// Returns error if the listener cannot be bound or the alert file
    /// cannot be opened.
    pub async fn run(&self) -> Result<()> {
        info!("Starting OrbitGuard relay v{}", env!("CARGO_PKG_VERSION"));

        let listener =
            TcpTransport::bind_addr(self.config.network.listen_addr, self.config.network.backlog)
                .await
                .map_err(|e| ServerError::startup_failed(format!("TCP bind failed: {e}")))?;

        let signal_task = self.spawn_signal_task();
        let result = self.serve_on(listener).await;
        signal_task.abort();
        result
    }

    /// Serves on an already bound listener until shutdown is triggered.
    ///
    /// # Errors
    /// Returns error if the alert file cannot be opened.
    pub async fn serve_on(&self, listener: TcpTransport) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let (persist_stop_tx, _) = broadcast::channel(1);
        let persister = self.start_persister(&persist_stop_tx).await?;
        let stats_task = self.spawn_stats_task();

        let max_connections = self.config.limits.max_connections;
        let permits = Arc::new(Semaphore::new(max_connections));

        info!(
            listen = %listener.local_addr(),
            downstream = %self.config.downstream.addr,
            max_connections,
            "Relay listening"
        );

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let permit = tokio::select! {
                _ = shutdown_rx.recv() => break,
                permit = Arc::clone(&permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (stream, conn) = tokio::select! {
                _ = shutdown_rx.recv() => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        if !self.shutdown.load(Ordering::SeqCst) {
                            warn!("Accept failed: {}", e);
                            tokio::time::sleep(ACCEPT_BACKOFF).await;
                        }
                        continue;
                    }
                },
            };

            self.spawn_connection(stream, conn, permit);
        }

        info!("Shutting down relay...");
        self.shutdown.store(true, Ordering::SeqCst);
        listener.shutdown();
        drop(listener);

        let all = u32::try_from(max_connections).unwrap_or(u32::MAX);
        match tokio::time::timeout(SHUTDOWN_GRACE, permits.acquire_many(all)).await {
            Ok(_) => debug!("All connections finished"),
            Err(_) => warn!(
                in_flight = max_connections.saturating_sub(permits.available_permits()),
                "Grace period elapsed with connections still in flight"
            ),
        }

        stats_task.abort();

        if let Some(task) = persister {
            self.handler.alerts().detach_persister();
            let _ = persist_stop_tx.send(());
            match tokio::time::timeout(PERSIST_DRAIN, task).await {
                Ok(Ok(())) => debug!("Alert persister drained"),
                Ok(Err(e)) => warn!("Alert persister failed: {}", e),
                Err(_) => warn!("Alert persister timed out during shutdown"),
            }
        }

        info!(stats = %self.stats().snapshot(), "Relay shutdown complete");
        Ok(())
    }

    /// Triggers server shutdown programmatically.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());
    }

    /// Returns `true` once shutdown has been triggered.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    // ========================================
    // Tasks
    // ========================================

    async fn start_persister(
        &self,
        stop: &broadcast::Sender<()>,
    ) -> Result<Option<JoinHandle<()>>> {
        let Some(path) = &self.config.alerts.persist_path else {
            return Ok(None);
        };

        let (persister, tx) = AlertPersister::open(path).await?;
        self.handler.alerts().attach_persister(tx);
        Ok(Some(tokio::spawn(persister.run(stop.subscribe()))))
    }

    fn spawn_signal_task(&self) -> JoinHandle<()> {
        let shutdown = Arc::clone(&self.shutdown);
        let shutdown_tx = self.shutdown_tx.clone();

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal");
                    shutdown.store(true, Ordering::SeqCst);
                    let _ = shutdown_tx.send(());
                }
                Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
            }
        })
    }

    fn spawn_stats_task(&self) -> JoinHandle<()> {
        let handler = Arc::clone(&self.handler);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + STATS_INTERVAL;
            let mut ticker = tokio::time::interval_at(start, STATS_INTERVAL);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Stats task received shutdown signal");
                        break;
                    }
                    _ = ticker.tick() => {
                        info!(
                            stats = %handler.stats().snapshot(),
                            blocked = handler.rate_limiter().blocked_count(),
                            tracked = handler.rate_limiter().tracked_count(),
                            alerts = handler.alerts().total_recorded(),
                            "Relay stats"
                        );
                    }
                }
            }
        })
    }

    /// Spawns the task for one connection. The work runs in an inner task
    /// so a panic surfaces as a `JoinError` instead of unwinding here.
    fn spawn_connection(&self, stream: TcpStream, conn: ConnectionSource, permit: OwnedSemaphorePermit) {
        let handler = Arc::clone(&self.handler);
        let read_timeout = self.config.limits.read_timeout();
        let source = SourceAddr::from(conn.addr);

        tokio::spawn(async move {
            let _permit = permit;
            let work = tokio::spawn(handle_connection(
                Arc::clone(&handler),
                stream,
                source,
                read_timeout,
            ));

            if let Err(e) = work.await {
                if e.is_panic() {
                    error!(source = %source, "Connection task panicked");
                    handler.record_internal_error(source, "Internal error while handling message");
                } else {
                    debug!(source = %source, "Connection task cancelled");
                }
            }
        });
    }
}

/// Reads one message from `stream`, closes it and runs the pipeline.
async fn handle_connection(
    handler: Arc<EnvelopeHandler>,
    mut stream: TcpStream,
    source: SourceAddr,
    read_timeout: Duration,
) {
    let raw = match read_message(&mut stream, handler.max_message_size(), read_timeout).await {
        Ok(raw) => raw,
        Err(e) if e.is_timeout() => {
            handler.record_abandoned(source, "read timeout");
            return;
        }
        Err(e) => {
            handler.record_abandoned(source, &e.to_string());
            return;
        }
    };
    drop(stream);

    if raw.is_empty() {
        handler.record_abandoned(source, "empty message");
        return;
    }

    handler.handle(source, &raw).await;
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listen_addr", &self.config.network.listen_addr)
            .field("downstream", &self.config.downstream.addr)
            .finish()
    }
}

// ============================================
// Tests
// ============================================
