//! # Configuration Management
//!
//! Typed configuration for the gateway's listeners, session guard and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()` / `from_toml()`
//! - Environment overrides via `from_env()`
//! - Direct instantiation with defaults
//!
//! A listener section that is absent (`None`) disables that transport.
//! Durations are expressed in milliseconds in TOML.

use crate::error::{GatewayError, Result};
use crate::session::SessionOptions;
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Current application frame version
pub const PROTOCOL_VERSION: i8 = 1;

/// Largest payload a `u16` length prefix can describe
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// Default depth of a session's outbound queue
pub const DEFAULT_SEND_QUEUE: usize = 1024;

/// Default per-connection packet budget for one rate window
pub const DEFAULT_RPM_LIMIT: u32 = 200;

/// Top-level gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Raw TCP listener; disabled when absent
    #[serde(default)]
    pub socket: Option<SocketConfig>,

    /// WebSocket listener; disabled when absent
    #[serde(default)]
    pub websocket: Option<WebSocketConfig>,

    /// Abuse-control timings
    #[serde(default)]
    pub guard: GuardConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            socket: Some(SocketConfig::default()),
            websocket: None,
            guard: GuardConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| GatewayError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| GatewayError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| GatewayError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("EDGE_GATEWAY_SOCKET_ADDRESS") {
            config.socket.get_or_insert_with(SocketConfig::default).address = addr;
        }

        if let Ok(addr) = std::env::var("EDGE_GATEWAY_WEBSOCKET_ADDRESS") {
            config
                .websocket
                .get_or_insert_with(WebSocketConfig::default)
                .address = addr;
        }

        if let Ok(limit) = std::env::var("EDGE_GATEWAY_RPM_LIMIT") {
            let val = limit.parse::<u32>().map_err(|e| {
                GatewayError::ConfigError(format!("Invalid EDGE_GATEWAY_RPM_LIMIT: {e}"))
            })?;
            if let Some(socket) = config.socket.as_mut() {
                socket.rpm_limit = val;
            }
            if let Some(ws) = config.websocket.as_mut() {
                ws.rpm_limit = val;
            }
        }

        if let Ok(level) = std::env::var("EDGE_GATEWAY_LOG_LEVEL") {
            config.logging.log_level = level.parse::<Level>().map_err(|_| {
                GatewayError::ConfigError(format!("Invalid EDGE_GATEWAY_LOG_LEVEL: {level}"))
            })?;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        let mut example = Self::default();
        example.websocket = Some(WebSocketConfig::default());
        toml::to_string_pretty(&example)
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.socket.is_none() && self.websocket.is_none() {
            errors.push("At least one listener (socket or websocket) must be configured".into());
        }

        if let Some(socket) = &self.socket {
            errors.extend(socket.validate());
        }

        if let Some(ws) = &self.websocket {
            errors.extend(ws.validate());
        }

        if let (Some(socket), Some(ws)) = (&self.socket, &self.websocket) {
            if socket.address == ws.address {
                errors.push(format!(
                    "Socket and websocket listeners share address '{}'",
                    socket.address
                ));
            }
        }

        errors.extend(self.guard.validate());
        errors.extend(self.logging.validate());

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(GatewayError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn validate_address(kind: &str, address: &str, errors: &mut Vec<String>) {
    if address.is_empty() {
        errors.push(format!("{kind} address cannot be empty"));
    } else if address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(format!(
            "Invalid {kind} address format: '{address}' (expected format: '0.0.0.0:9091')"
        ));
    }
}

fn validate_session(kind: &str, read: Duration, queue: usize, errors: &mut Vec<String>) {
    if read.as_millis() < 100 {
        errors.push(format!("{kind} read deadline too short (minimum: 100ms)"));
    }
    if queue == 0 {
        errors.push(format!("{kind} send queue capacity must be greater than 0"));
    } else if queue > 1_000_000 {
        errors.push(format!(
            "{kind} send queue capacity too large: {queue} (max recommended: 1,000,000)"
        ));
    }
}

/// Raw TCP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SocketConfig {
    /// Listen address (e.g., "0.0.0.0:9091")
    pub address: String,

    /// Kernel receive buffer size for accepted sockets
    pub read_buffer_size: u32,

    /// Kernel send buffer size for accepted sockets
    pub write_buffer_size: u32,

    /// Deadline re-armed before every frame read
    #[serde(with = "duration_serde")]
    pub read_deadline: Duration,

    /// Deadline for every frame write; zero disables it
    #[serde(with = "duration_serde")]
    pub write_deadline: Duration,

    /// Depth of each session's outbound queue
    pub send_queue_capacity: usize,

    /// Packets allowed per rate window once authorized
    pub rpm_limit: u32,

    /// Time allowed for live connections to finish after shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            address: String::from("0.0.0.0:9091"),
            read_buffer_size: 32767,
            write_buffer_size: 32767,
            read_deadline: timeout::DEFAULT_READ_DEADLINE,
            write_deadline: Duration::ZERO,
            send_queue_capacity: DEFAULT_SEND_QUEUE,
            rpm_limit: DEFAULT_RPM_LIMIT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl SocketConfig {
    /// Per-session options derived from this listener
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            read_deadline: self.read_deadline,
            write_deadline: self.write_deadline,
            max_message_size: MAX_FRAME_SIZE,
            send_queue_capacity: self.send_queue_capacity,
        }
    }

    /// Validate socket listener configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        validate_address("socket", &self.address, &mut errors);
        validate_session(
            "socket",
            self.read_deadline,
            self.send_queue_capacity,
            &mut errors,
        );

        if self.read_buffer_size == 0 || self.write_buffer_size == 0 {
            errors.push("socket buffer sizes must be greater than 0".to_string());
        }

        if self.rpm_limit == 0 {
            errors.push("socket rpm limit must be greater than 0".to_string());
        }

        errors
    }
}

/// WebSocket listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebSocketConfig {
    /// Listen address (e.g., "0.0.0.0:9093")
    pub address: String,

    /// Request path accepted for the upgrade
    pub path: String,

    /// Time allowed for the HTTP upgrade to complete
    #[serde(with = "duration_serde")]
    pub handshake_timeout: Duration,

    /// Deadline re-armed before every message read
    #[serde(with = "duration_serde")]
    pub read_deadline: Duration,

    /// Deadline for every message write; zero disables it
    #[serde(with = "duration_serde")]
    pub write_deadline: Duration,

    /// Largest accepted message, length prefix included
    pub max_message_size: usize,

    /// Depth of each session's outbound queue
    pub send_queue_capacity: usize,

    /// Packets allowed per rate window once authorized
    pub rpm_limit: u32,

    /// Time allowed for live connections to finish after shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            address: String::from("0.0.0.0:9093"),
            path: String::from("/websocket"),
            handshake_timeout: timeout::DEFAULT_TIMEOUT,
            read_deadline: timeout::DEFAULT_READ_DEADLINE,
            write_deadline: Duration::ZERO,
            max_message_size: MAX_FRAME_SIZE + 2,
            send_queue_capacity: DEFAULT_SEND_QUEUE,
            rpm_limit: DEFAULT_RPM_LIMIT,
            shutdown_timeout: timeout::SHUTDOWN_TIMEOUT,
        }
    }
}

impl WebSocketConfig {
    /// Per-session options derived from this listener
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            read_deadline: self.read_deadline,
            write_deadline: self.write_deadline,
            max_message_size: self.max_message_size,
            send_queue_capacity: self.send_queue_capacity,
        }
    }

    /// Validate websocket listener configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        validate_address("websocket", &self.address, &mut errors);
        validate_session(
            "websocket",
            self.read_deadline,
            self.send_queue_capacity,
            &mut errors,
        );

        if !self.path.starts_with('/') {
            errors.push(format!(
                "websocket path must start with '/': '{}'",
                self.path
            ));
        }

        if self.handshake_timeout.as_millis() < 100 {
            errors.push("websocket handshake timeout too short (minimum: 100ms)".to_string());
        }

        if self.max_message_size < 3 {
            errors.push("websocket max message size too small (minimum: 3 bytes)".to_string());
        } else if self.max_message_size > MAX_FRAME_SIZE + 2 {
            errors.push(format!(
                "websocket max message size too large: {} (maximum: {})",
                self.max_message_size,
                MAX_FRAME_SIZE + 2
            ));
        }

        if self.rpm_limit == 0 {
            errors.push("websocket rpm limit must be greater than 0".to_string());
        }

        errors
    }
}

/// Abuse-control timings applied to every connection
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct GuardConfig {
    /// Unauthorized connections that have not started the handshake are dropped after this
    #[serde(with = "duration_serde")]
    pub handshake_grace: Duration,

    /// Unauthorized connections are dropped after this regardless of handshake state
    #[serde(with = "duration_serde")]
    pub absolute_grace: Duration,

    /// Length of the rolling packet-count window for authorized connections
    #[serde(with = "duration_serde")]
    pub rate_window: Duration,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            handshake_grace: Duration::from_secs(5),
            absolute_grace: Duration::from_secs(60),
            rate_window: Duration::from_secs(60),
        }
    }
}

impl GuardConfig {
    /// Validate guard timings
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.handshake_grace.is_zero() {
            errors.push("Handshake grace must be greater than 0".to_string());
        }

        if self.absolute_grace < self.handshake_grace {
            errors.push("Absolute grace cannot be shorter than handshake grace".to_string());
        }

        if self.rate_window.as_secs() < 1 {
            errors.push("Rate window too short (minimum: 1s)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level used when `RUST_LOG` is not set
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Whether to include ANSI colors in plain output
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("edge-gateway"),
            log_level: Level::INFO,
            json_format: false,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
