// ============================================
// File: crates/orbitguard-server/src/services/alerts.rs
// ============================================
//! # Alert Log
//!
//! ## Creation Reason
//! Every security finding the pipeline makes is recorded as an `Alert`.
//! This module owns the alert vocabulary, the in-memory log shared by all
//! connection tasks, and the background task that appends alerts to disk.
//!
//! ## Main Functionality
//! - `AlertKind` / `Severity`: Closed set of findings with a fixed severity map
//! - `Alert`: One finding, serialized as a JSON line
//! - `AlertLog`: Bounded, lock-protected, append-only log
//! - `AlertPersister`: Channel-fed JSONL writer
//!
//! ## Severity Map
//! ```text
//! FLOOD_ATTACK_DETECTED ─┐
//! ENCRYPTION_TAMPERING  ─┴─► HIGH
//! INVALID_STRUCTURE     ─┐
//! BLOCKED_SOURCE         │
//! DATA_TAMPERING         ├─► MEDIUM   (DATA_TAMPERING → HIGH if escalated)
//! SIGNATURE_TAMPERING    │
//! PROCESSING_ERROR      ─┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Appends must never block on disk I/O; the persister channel uses `try_send`
//! - When the log is full the oldest alert is dropped, the total keeps counting
//!
//! ## Last Modified
//! v0.1.0 - Initial alert log

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use orbitguard_common::time::iso_timestamp;
use orbitguard_common::types::SourceAddr;

use crate::error::{Result, ServerError};

// ============================================
// Constants
// ============================================

/// Longest `details` text kept on an alert, in characters.
pub const MAX_DETAILS_CHARS: usize = 256;

/// Capacity of the persister channel.
const PERSIST_QUEUE: usize = 1024;

// ============================================
// AlertKind / Severity
// ============================================

/// Category of a security finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    /// Envelope could not be parsed.
    InvalidStructure,
    /// Message from a source already on the blocklist.
    BlockedSource,
    /// Source exceeded the flood threshold and was blocked.
    FloodAttackDetected,
    /// Payload failed authentication.
    EncryptionTampering,
    /// Decrypted reading outside its plausible range.
    DataTampering,
    /// Signature token does not match the sealed sequence.
    SignatureTampering,
    /// Unexpected internal failure or malformed plaintext.
    ProcessingError,
}

impl AlertKind {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidStructure => "INVALID_STRUCTURE",
            Self::BlockedSource => "BLOCKED_SOURCE",
            Self::FloodAttackDetected => "FLOOD_ATTACK_DETECTED",
            Self::EncryptionTampering => "ENCRYPTION_TAMPERING",
            Self::DataTampering => "DATA_TAMPERING",
            Self::SignatureTampering => "SIGNATURE_TAMPERING",
            Self::ProcessingError => "PROCESSING_ERROR",
        }
    }

    /// Returns the default severity for this kind.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::FloodAttackDetected | Self::EncryptionTampering => Severity::High,
            Self::InvalidStructure
            | Self::BlockedSource
            | Self::DataTampering
            | Self::SignatureTampering
            | Self::ProcessingError => Severity::Medium,
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Needs review.
    Medium,
    /// Active attack.
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
        })
    }
}

// ============================================
// Alert
// ============================================

/// One recorded security finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// Finding category.
    #[serde(rename = "type")]
    pub kind: AlertKind,
    /// Source IP the finding is about.
    pub source: SourceAddr,
    /// Human-readable detail, at most `MAX_DETAILS_CHARS` characters.
    pub details: String,
    /// Severity, fixed at construction.
    pub severity: Severity,
    /// ISO-8601 UTC time of recording.
    pub timestamp: String,
}

impl Alert {
    /// Creates an alert with the kind's default severity.
    pub fn new(kind: AlertKind, source: SourceAddr, details: impl Into<String>) -> Self {
        Self::with_severity(kind, source, details, kind.severity())
    }

    /// Creates an alert with an explicit severity.
    pub fn with_severity(
        kind: AlertKind,
        source: SourceAddr,
        details: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            kind,
            source,
            details: bound_details(details.into()),
            severity,
            timestamp: iso_timestamp(),
        }
    }
}

fn bound_details(details: String) -> String {
    match details.char_indices().nth(MAX_DETAILS_CHARS) {
        Some((cut, _)) => details[..cut].to_string(),
        None => details,
    }
}

// ============================================
// AlertLog
// ============================================

/// Shared, bounded alert log.
///
/// # Thread Safety
/// Appends take a short `parking_lot` lock; concurrent writers never lose
/// an alert and each writer's alerts stay in its own order.
#[derive(Debug)]
pub struct AlertLog {
    entries: Mutex<VecDeque<Alert>>,
    max_retained: usize,
    total: AtomicU64,
    persist_tx: Mutex<Option<mpsc::Sender<Alert>>>,
}

impl AlertLog {
    /// Creates a log keeping at most `max_retained` alerts in memory.
    #[must_use]
    pub fn new(max_retained: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_retained.min(1024))),
            max_retained: max_retained.max(1),
            total: AtomicU64::new(0),
            persist_tx: Mutex::new(None),
        }
    }

    /// Routes every future alert to a persister as well.
    pub fn attach_persister(&self, tx: mpsc::Sender<Alert>) {
        *self.persist_tx.lock() = Some(tx);
    }

    /// Stops routing alerts to the persister, letting it drain and exit.
    pub fn detach_persister(&self) {
        self.persist_tx.lock().take();
    }

    /// Records an alert.
    pub fn record(&self, alert: Alert) {
        warn!(
            kind = %alert.kind,
            severity = %alert.severity,
            source = %alert.source,
            "{}",
            alert.details
        );

        if let Some(tx) = self.persist_tx.lock().as_ref() {
            if tx.try_send(alert.clone()).is_err() {
                debug!("Alert persister queue full or closed, alert kept in memory only");
            }
        }

        let mut entries = self.entries.lock();
        if entries.len() == self.max_retained {
            entries.pop_front();
        }
        entries.push_back(alert);
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Convenience: builds and records an alert with the default severity.
    pub fn raise(&self, kind: AlertKind, source: SourceAddr, details: impl Into<String>) {
        self.record(Alert::new(kind, source, details));
    }

    /// Returns a copy of the retained alerts, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Alert> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Returns how many retained alerts have `kind`.
    #[must_use]
    pub fn count_of(&self, kind: AlertKind) -> usize {
        self.entries.lock().iter().filter(|a| a.kind == kind).count()
    }

    /// Returns the number of retained alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no alert is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns the number of alerts ever recorded.
    #[must_use]
    pub fn total_recorded(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

// ============================================
// AlertPersister
// ============================================

/// Background task appending alerts to a JSON-lines file.
pub struct AlertPersister {
    path: PathBuf,
    file: tokio::fs::File,
    rx: mpsc::Receiver<Alert>,
}

impl AlertPersister {
    /// Opens (or creates) `path` for appending and returns the persister
    /// with the sender to hand to [`AlertLog::attach_persister`].
    ///
    /// # Errors
    /// `AlertPersist` if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<(Self, mpsc::Sender<Alert>)> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ServerError::alert_persist(path.display().to_string(), e.to_string()))?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| ServerError::alert_persist(path.display().to_string(), e.to_string()))?;

        let (tx, rx) = mpsc::channel(PERSIST_QUEUE);
        Ok((Self { path, file, rx }, tx))
    }

    /// Runs until every sender is gone, or until shutdown; in the latter
    /// case queued alerts are still drained before returning.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!("Alert persister writing to {}", self.path.display());

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    self.rx.close();
                    while let Some(alert) = self.rx.recv().await {
                        self.write(&alert).await;
                    }
                    break;
                }
                next = self.rx.recv() => match next {
                    Some(alert) => self.write(&alert).await,
                    None => break,
                },
            }
        }

        if let Err(e) = self.file.flush().await {
            warn!("Alert log flush failed: {}", e);
        }
        info!("Alert persister stopped");
    }

    async fn write(&mut self, alert: &Alert) {
        let mut line = match serde_json::to_vec(alert) {
            Ok(line) => line,
            Err(e) => {
                warn!("Alert serialization failed: {}", e);
                return;
            }
        };
        line.push(b'\n');

        if let Err(e) = self.file.write_all(&line).await {
            warn!("Alert write to {} failed: {}", self.path.display(), e);
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn src() -> SourceAddr {
        "10.0.0.5".parse().unwrap()
    }

    #[test]
    fn test_severity_map() {
        assert_eq!(AlertKind::FloodAttackDetected.severity(), Severity::High);
        assert_eq!(AlertKind::EncryptionTampering.severity(), Severity::High);
        assert_eq!(AlertKind::DataTampering.severity(), Severity::Medium);
        assert_eq!(AlertKind::SignatureTampering.severity(), Severity::Medium);
        assert_eq!(AlertKind::BlockedSource.severity(), Severity::Medium);
        assert_eq!(AlertKind::ProcessingError.severity(), Severity::Medium);
        assert_eq!(AlertKind::InvalidStructure.severity(), Severity::Medium);
    }

    #[test]
    fn test_alert_json_shape() {
        let alert = Alert::new(AlertKind::FloodAttackDetected, src(), "16 messages/10s");
        let json: serde_json::Value = serde_json::to_value(&alert).unwrap();

        assert_eq!(json["type"], "FLOOD_ATTACK_DETECTED");
        assert_eq!(json["severity"], "HIGH");
        assert_eq!(json["source"], "10.0.0.5");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_details_are_bounded() {
        let alert = Alert::new(AlertKind::ProcessingError, src(), "é".repeat(1000));
        assert_eq!(alert.details.chars().count(), MAX_DETAILS_CHARS);
    }

    #[test]
    fn test_log_drops_oldest_when_full() {
        let log = AlertLog::new(3);
        for i in 0..5 {
            log.raise(AlertKind::DataTampering, src(), format!("#{i}"));
        }

        let details: Vec<_> = log.snapshot().into_iter().map(|a| a.details).collect();
        assert_eq!(details, vec!["#2", "#3", "#4"]);
        assert_eq!(log.total_recorded(), 5);
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        let log = Arc::new(AlertLog::new(10_000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        log.raise(AlertKind::SignatureTampering, src(), format!("{t}:{i}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(log.len(), 800);
        let alerts = log.snapshot();
        for t in 0..8 {
            let own: Vec<usize> = alerts
                .iter()
                .filter_map(|a| a.details.strip_prefix(&format!("{t}:")))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(own, (0..100).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_persister_writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("alerts.jsonl");

        let (persister, tx) = AlertPersister::open(&path).await.unwrap();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(persister.run(shutdown_rx));

        let log = AlertLog::new(10);
        log.attach_persister(tx);
        log.raise(AlertKind::EncryptionTampering, src(), "Invalid encryption token");
        log.raise(AlertKind::DataTampering, src(), "temperature -120");

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<Alert> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].kind, AlertKind::EncryptionTampering);
        assert_eq!(lines[1].details, "temperature -120");
    }

    #[tokio::test]
    async fn test_persister_exits_when_detached() {
        let dir = tempfile::tempdir().unwrap();
        let (persister, tx) = AlertPersister::open(dir.path().join("a.jsonl")).await.unwrap();
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(persister.run(shutdown_rx));

        let log = AlertLog::new(10);
        log.attach_persister(tx);
        log.detach_persister();

        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
