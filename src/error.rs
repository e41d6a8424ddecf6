//! # Error Types
//!
//! Error handling for the gateway: codec, session engine, transports and the
//! actor runtime all report through [`GatewayError`].
//!
//! ## Error Categories
//! - **Transport errors**: socket/WebSocket failures and deadlines. These end the
//!   affected session only and are logged rather than propagated.
//! - **Protocol errors**: malformed frames, invalid identifiers, truncated input.
//!   Callers treat them as fatal to the session.
//! - **Application errors**: returned by command handlers and delivered back to the
//!   client inside an error response.
//! - **Runtime errors**: actor failures surfaced through the runtime container.
//!
//! ## Example Usage
//! ```rust
//! use edge_gateway::core::buffer::ByteBuffer;
//! use edge_gateway::error::{GatewayError, Result};
//!
//! fn read_header(frame: &[u8]) -> Result<u32> {
//!     let mut rd = ByteBuffer::from_slice(frame);
//!     rd.read_i8()?;
//!     rd.read_u32()
//! }
//!
//! assert!(matches!(read_header(&[1, 0]), Err(GatewayError::UnexpectedEof)));
//! ```

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Dispatcher-related error messages
    pub const ERR_DISPATCHER_WRITE_LOCK: &str = "Failed to acquire write lock on dispatcher";
    pub const ERR_DISPATCHER_READ_LOCK: &str = "Failed to acquire read lock on dispatcher";

    /// Frame validation errors
    pub const ERR_ZERO_SEQUENCE: &str = "sequence id must be non-zero";
    pub const ERR_BAD_COMMAND: &str = "command and sub-command must be positive";
    pub const ERR_EMPTY_PAYLOAD: &str = "payload must not be empty";
    pub const ERR_STRING_TOO_LONG: &str = "length-prefixed field exceeds 65535 bytes";

    /// Connection errors
    pub const ERR_NON_BINARY_MESSAGE: &str = "non-binary websocket message";
    pub const ERR_SHORT_MESSAGE: &str = "websocket message shorter than its length prefix";

    /// Cipher errors
    pub const ERR_CIPHER_NOT_SET: &str = "cipher not installed for encrypting session";
    pub const ERR_CIPHER_LOCK: &str = "cipher state poisoned";
    pub const ERR_RC4_KEY_LEN: &str = "rc4 key must be 1..=32 bytes";

    /// Session errors
    pub const ERR_SESSION_START: &str = "session task exited before signalling ready";

    /// Runtime errors
    pub const ERR_ACTOR_CHANNEL: &str = "runtime completion channel closed early";
    pub const ERR_LISTENER_RUNNING: &str = "listener is already running";
}

/// GatewayError is the primary error type for all gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid frame: {0}")]
    InvalidFrame(&'static str),

    #[error("Unexpected end of data")]
    UnexpectedEof,

    #[error("Frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("Send channel full")]
    ChannelFull,

    #[error("Session closed")]
    SessionClosed,

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout occurred")]
    Timeout,

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(&'static str),

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Cipher error: {0}")]
    CipherError(&'static str),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Runtime error: {0}")]
    RuntimeError(&'static str),

    #[error("Actor {0} panicked: {1}")]
    ActorPanicked(u32, String),

    #[error("{0}")]
    Application(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for GatewayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::error::CapacityError;
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => GatewayError::ConnectionClosed,
            WsError::Io(e) => GatewayError::Io(e),
            WsError::Capacity(CapacityError::MessageTooLong { size, .. }) => {
                GatewayError::OversizedFrame(size)
            }
            other => GatewayError::WebSocket(other.to_string()),
        }
    }
}

impl GatewayError {
    /// Whether the error should terminate the session that produced it.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GatewayError::Application(_) | GatewayError::ChannelFull)
    }

    /// Whether the peer sent bytes that do not form a valid frame.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidFrame(_)
                | GatewayError::UnexpectedEof
                | GatewayError::OversizedFrame(_)
                | GatewayError::ProtocolViolation(_)
                | GatewayError::DecryptionFailure
        )
    }
}

/// Type alias for Results using GatewayError
pub type Result<T> = std::result::Result<T, GatewayError>;
