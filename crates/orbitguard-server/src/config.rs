// ============================================
// File: crates/orbitguard-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the OrbitGuard relay, loaded
//! from a TOML file with the shared key optionally supplied through the
//! environment.
//!
//! ## Main Functionality
//! - `ServerConfig`: Main configuration structure
//! - TOML file loading and parsing
//! - Configuration validation
//! - Defaults matching the reference deployment
//!
//! ## Configuration Sections
//! - `network`: Listen address, backlog
//! - `downstream`: Ground station address, timeouts, retry, link latency
//! - `crypto`: Pre-shared key (base64)
//! - `limits`: Flood window/threshold, read timeout, size and capacity caps
//! - `policy`: Whether anomalies and signature mismatches block forwarding
//! - `bounds`: Plausible ranges for decrypted readings
//! - `alerts`: Retention and optional JSONL persistence
//! - `logging`: Log level
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! listen_addr = "0.0.0.0:5000"
//!
//! [downstream]
//! addr = "127.0.0.1:5001"
//!
//! [crypto]
//! shared_key = "q83vEjRWeJCrze8SNFZ4kKvN7xI0VniQq83vEjRWeJA="
//!
//! [limits]
//! flood_window_ms = 10000
//! flood_threshold = 15
//!
//! [bounds]
//! temperature = { min = -50.0, max = 50.0 }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - All config changes require restart
//! - `ORBITGUARD_SHARED_KEY` overrides `crypto.shared_key`
//! - Never log the key; `Debug` on `CryptoConfig` is redacted
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::info;

use orbitguard_core::crypto::SharedKey;

use crate::error::{Result, ServerError};

// ============================================
// Constants
// ============================================

/// Environment variable that overrides `crypto.shared_key`.
pub const SHARED_KEY_ENV: &str = "ORBITGUARD_SHARED_KEY";

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Inbound listener.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Ground station delivery.
    #[serde(default)]
    pub downstream: DownstreamConfig,

    /// Payload key.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Rate and resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Blocking policy for advisory findings.
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Plausibility bounds for readings.
    #[serde(default)]
    pub bounds: BoundsConfig,

    /// Alert log settings.
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the text cannot be parsed or validated.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.downstream.validate()?;
        self.crypto.validate()?;
        self.limits.validate()?;
        self.bounds.validate()?;
        self.alerts.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Resolves the shared key, preferring the environment.
    ///
    /// # Errors
    /// `ConfigMissing` if neither source provides a key, `ConfigInvalid` if
    /// the provided key is unusable.
    pub fn shared_key(&self) -> Result<SharedKey> {
        self.crypto
            .resolve(std::env::var(SHARED_KEY_ENV).ok().as_deref())
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP listen address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Listen backlog.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5000)
}

fn default_backlog() -> u32 {
    128
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        if self.listen_addr.port() == 0 {
            return Err(ServerError::config_invalid(
                "network.listen_addr",
                "port cannot be 0",
            ));
        }
        if self.backlog == 0 {
            return Err(ServerError::config_invalid(
                "network.backlog",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            backlog: default_backlog(),
        }
    }
}

// ============================================
// DownstreamConfig
// ============================================

/// Ground station delivery section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    /// Ground station address.
    #[serde(default = "default_downstream_addr")]
    pub addr: SocketAddr,

    /// Connect deadline in milliseconds.
    #[serde(default = "default_io_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Write deadline in milliseconds.
    #[serde(default = "default_io_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Total delivery attempts; 1 means fire-and-once.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff before the second attempt, doubled for each later one.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Simulated downlink delay applied before each delivery.
    #[serde(default)]
    pub link_latency_ms: u64,
}

fn default_downstream_addr() -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5001)
}

fn default_io_timeout_ms() -> u64 {
    3000
}

fn default_max_attempts() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl DownstreamConfig {
    fn validate(&self) -> Result<()> {
        if self.addr.port() == 0 {
            return Err(ServerError::config_invalid(
                "downstream.addr",
                "port cannot be 0",
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ServerError::config_invalid(
                "downstream.connect_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.write_timeout_ms == 0 {
            return Err(ServerError::config_invalid(
                "downstream.write_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.max_attempts == 0 {
            return Err(ServerError::config_invalid(
                "downstream.max_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the connect deadline.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the write deadline.
    #[must_use]
    pub const fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            addr: default_downstream_addr(),
            connect_timeout_ms: default_io_timeout_ms(),
            write_timeout_ms: default_io_timeout_ms(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            link_latency_ms: 0,
        }
    }
}

// ============================================
// CryptoConfig
// ============================================

/// Payload key section.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// Base64 of the 32-byte pre-shared key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_key: Option<String>,
}

impl CryptoConfig {
    fn validate(&self) -> Result<()> {
        if let Some(key) = &self.shared_key {
            SharedKey::from_base64(key)
                .map_err(|e| ServerError::config_invalid("crypto.shared_key", e.to_string()))?;
        }
        Ok(())
    }

    /// Resolves the key from `env_override` or the configured value.
    ///
    /// # Errors
    /// `ConfigMissing` if both are absent, `ConfigInvalid` if the chosen
    /// value is not a 32-byte base64 key.
    pub fn resolve(&self, env_override: Option<&str>) -> Result<SharedKey> {
        let (field, encoded) = match (env_override, self.shared_key.as_deref()) {
            (Some(env), _) if !env.trim().is_empty() => (SHARED_KEY_ENV, env),
            (_, Some(configured)) => ("crypto.shared_key", configured),
            _ => {
                return Err(ServerError::ConfigMissing {
                    field: "crypto.shared_key".into(),
                })
            }
        };
        SharedKey::from_base64(encoded).map_err(|e| ServerError::config_invalid(field, e.to_string()))
    }
}

impl std::fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("shared_key", &self.shared_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Resource limits section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Sliding window length for flood detection.
    #[serde(default = "default_flood_window_ms")]
    pub flood_window_ms: u64,

    /// Arrivals admitted per window before a source is blocked.
    #[serde(default = "default_flood_threshold")]
    pub flood_threshold: usize,

    /// Deadline for reading one inbound message.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Largest accepted envelope in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Cap on per-source state entries.
    #[serde(default = "default_max_tracked_sources")]
    pub max_tracked_sources: usize,

    /// Concurrent connection handlers.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_flood_window_ms() -> u64 {
    10_000
}

fn default_flood_threshold() -> usize {
    15
}

fn default_read_timeout_ms() -> u64 {
    5000
}

fn default_max_message_size() -> usize {
    orbitguard_core::protocol::DEFAULT_MAX_MESSAGE_SIZE
}

fn default_max_tracked_sources() -> usize {
    65_536
}

fn default_max_connections() -> usize {
    256
}

/// Upper bound for `limits.max_connections`. Shutdown drains the connection
/// semaphore with one `acquire_many`, which takes a `u32`.
fn max_connections_limit() -> usize {
    Semaphore::MAX_PERMITS.min(usize::try_from(u32::MAX).unwrap_or(usize::MAX))
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        let checks: [(&str, bool); 6] = [
            ("limits.flood_window_ms", self.flood_window_ms == 0),
            ("limits.flood_threshold", self.flood_threshold == 0),
            ("limits.read_timeout_ms", self.read_timeout_ms == 0),
            ("limits.max_message_size", self.max_message_size == 0),
            ("limits.max_tracked_sources", self.max_tracked_sources == 0),
            ("limits.max_connections", self.max_connections == 0),
        ];
        for (field, is_zero) in checks {
            if is_zero {
                return Err(ServerError::config_invalid(field, "must be greater than 0"));
            }
        }

        let limit = max_connections_limit();
        if self.max_connections > limit {
            return Err(ServerError::config_invalid(
                "limits.max_connections",
                format!("must be at most {limit}"),
            ));
        }
        Ok(())
    }

    /// Returns the flood window.
    #[must_use]
    pub const fn flood_window(&self) -> Duration {
        Duration::from_millis(self.flood_window_ms)
    }

    /// Returns the read deadline.
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            flood_window_ms: default_flood_window_ms(),
            flood_threshold: default_flood_threshold(),
            read_timeout_ms: default_read_timeout_ms(),
            max_message_size: default_max_message_size(),
            max_tracked_sources: default_max_tracked_sources(),
            max_connections: default_max_connections(),
        }
    }
}

// ============================================
// PolicyConfig
// ============================================

/// Blocking policy section. All switches default to advisory behavior.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Reject envelopes whose readings fall outside `bounds`.
    #[serde(default)]
    pub block_on_anomaly: bool,

    /// Reject envelopes whose signature token does not match.
    #[serde(default)]
    pub block_on_signature_mismatch: bool,

    /// Raise `DATA_TAMPERING` as HIGH instead of MEDIUM.
    #[serde(default)]
    pub escalate_data_anomalies: bool,
}

// ============================================
// BoundsConfig
// ============================================

/// Closed interval of plausible values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lowest plausible value.
    pub min: f64,
    /// Highest plausible value.
    pub max: f64,
}

impl ValueRange {
    /// Creates a range.
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Returns `true` if `value` lies within `[min, max]`.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Plausibility bounds section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundsConfig {
    /// Temperature in °C.
    #[serde(default = "default_temperature")]
    pub temperature: ValueRange,

    /// Relative humidity in %.
    #[serde(default = "default_percent")]
    pub humidity: ValueRange,

    /// Battery charge in %.
    #[serde(default = "default_percent")]
    pub battery: ValueRange,

    /// Latitude in degrees.
    #[serde(default = "default_latitude")]
    pub latitude: ValueRange,

    /// Longitude in degrees.
    #[serde(default = "default_longitude")]
    pub longitude: ValueRange,
}

fn default_temperature() -> ValueRange {
    ValueRange::new(-50.0, 50.0)
}

fn default_percent() -> ValueRange {
    ValueRange::new(0.0, 100.0)
}

fn default_latitude() -> ValueRange {
    ValueRange::new(-90.0, 90.0)
}

fn default_longitude() -> ValueRange {
    ValueRange::new(-180.0, 180.0)
}

impl BoundsConfig {
    fn validate(&self) -> Result<()> {
        for (field, range) in self.named() {
            if !(range.min.is_finite() && range.max.is_finite()) || range.min > range.max {
                return Err(ServerError::config_invalid(
                    format!("bounds.{field}"),
                    "min must be finite and not greater than max",
                ));
            }
        }
        Ok(())
    }

    /// Returns every range with its reading name, in check order.
    #[must_use]
    pub fn named(&self) -> [(&'static str, ValueRange); 5] {
        [
            ("temperature", self.temperature),
            ("humidity", self.humidity),
            ("battery", self.battery),
            ("latitude", self.latitude),
            ("longitude", self.longitude),
        ]
    }
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            humidity: default_percent(),
            battery: default_percent(),
            latitude: default_latitude(),
            longitude: default_longitude(),
        }
    }
}

// ============================================
// AlertsConfig
// ============================================

/// Alert log section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Alerts kept in memory; older ones are discarded.
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,

    /// Optional JSON-lines file every alert is appended to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_path: Option<PathBuf>,
}

fn default_max_retained() -> usize {
    10_000
}

impl AlertsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_retained == 0 {
            return Err(ServerError::config_invalid(
                "alerts.max_retained",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            max_retained: default_max_retained(),
            persist_path: None,
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_B64: &str = "AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8=";

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network.listen_addr.port(), 5000);
        assert_eq!(config.downstream.addr.port(), 5001);
        assert_eq!(config.limits.flood_threshold, 15);
        assert_eq!(config.limits.flood_window(), Duration::from_secs(10));
        assert!(!config.policy.block_on_anomaly);
        assert!(!config.policy.block_on_signature_mismatch);
        assert_eq!(config.bounds.temperature, ValueRange::new(-50.0, 50.0));
    }

    #[test]
    fn test_full_config_format() {
        let toml = format!(
            r#"
            [network]
            listen_addr = "127.0.0.1:6000"
            backlog = 64

            [downstream]
            addr = "10.1.1.1:7000"
            max_attempts = 3
            link_latency_ms = 500

            [crypto]
            shared_key = "{KEY_B64}"

            [limits]
            flood_window_ms = 2000
            flood_threshold = 5

            [policy]
            block_on_signature_mismatch = true

            [bounds]
            temperature = {{ min = -80.0, max = 60.0 }}

            [alerts]
            max_retained = 100
            persist_path = "/tmp/alerts.jsonl"

            [logging]
            level = "debug"
        "#
        );

        let config = ServerConfig::from_str(&toml).unwrap();
        assert_eq!(config.network.backlog, 64);
        assert_eq!(config.downstream.max_attempts, 3);
        assert_eq!(config.downstream.link_latency_ms, 500);
        assert_eq!(config.limits.flood_threshold, 5);
        assert!(config.policy.block_on_signature_mismatch);
        assert_eq!(config.bounds.temperature.min, -80.0);
        assert_eq!(config.bounds.humidity, ValueRange::new(0.0, 100.0));
        assert_eq!(config.alerts.persist_path, Some(PathBuf::from("/tmp/alerts.jsonl")));
        assert!(config.crypto.resolve(None).is_ok());
    }

    #[test]
    fn test_rejects_zero_values() {
        for toml in [
            "[limits]\nflood_threshold = 0",
            "[limits]\nflood_window_ms = 0",
            "[limits]\nread_timeout_ms = 0",
            "[downstream]\nmax_attempts = 0",
            "[network]\nlisten_addr = \"0.0.0.0:0\"",
            "[alerts]\nmax_retained = 0",
        ] {
            let err = ServerConfig::from_str(toml).unwrap_err();
            assert!(
                matches!(err, ServerError::ConfigInvalid { .. }),
                "{toml} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_unbounded_connection_cap() {
        let mut config = ServerConfig::default();
        config.limits.max_connections = usize::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("limits.max_connections"));

        config.limits.max_connections = max_connections_limit();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_inverted_bounds() {
        let err = ServerConfig::from_str("[bounds]\nbattery = { min = 90.0, max = 10.0 }").unwrap_err();
        assert!(err.to_string().contains("bounds.battery"));
    }

    #[test]
    fn test_rejects_short_key() {
        let err = ServerConfig::from_str("[crypto]\nshared_key = \"AAECAw==\"").unwrap_err();
        assert!(err.to_string().contains("crypto.shared_key"));
    }

    #[test]
    fn test_key_resolution_order() {
        let mut crypto = CryptoConfig::default();
        assert!(matches!(
            crypto.resolve(None),
            Err(ServerError::ConfigMissing { .. })
        ));

        let env_key = SharedKey::from_bytes([9u8; 32]).to_base64();
        assert_eq!(crypto.resolve(Some(&env_key)).unwrap().as_bytes(), &[9u8; 32]);

        crypto.shared_key = Some(KEY_B64.to_string());
        assert_eq!(crypto.resolve(Some(&env_key)).unwrap().as_bytes(), &[9u8; 32]);
        assert_eq!(crypto.resolve(Some("  ")).unwrap().as_bytes()[1], 1);
    }

    #[test]
    fn test_debug_redacts_key() {
        let crypto = CryptoConfig {
            shared_key: Some(KEY_B64.to_string()),
        };
        let dbg = format!("{crypto:?}");
        assert!(!dbg.contains(KEY_B64));
        assert!(dbg.contains("REDACTED"));
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let text = ServerConfig::default().to_toml();
        let parsed = ServerConfig::from_str(&text).unwrap();
        assert_eq!(parsed.limits.flood_threshold, 15);
        assert_eq!(parsed.bounds.longitude, ValueRange::new(-180.0, 180.0));
    }

    #[test]
    fn test_value_range() {
        let range = ValueRange::new(-50.0, 50.0);
        assert!(range.contains(-50.0));
        assert!(range.contains(50.0));
        assert!(!range.contains(-120.0));
        assert!(!range.contains(f64::NAN));
    }
}
