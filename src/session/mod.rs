//! # Session Engine
//!
//! One [`Session`] per accepted connection. Each session runs two tasks:
//!
//! - **receiver**: reads frames from the transport under a per-read deadline and
//!   hands them to the guard loop through an unbuffered channel, so a slow
//!   dispatcher throttles the socket.
//! - **sender**: drains a bounded outbound queue, applies the session cipher and
//!   writes frames. On WebSocket connections it also pings every second.
//!
//! Either task stopping stops the other. [`Session::kick`] stops both and is
//! idempotent. The [`Store`] indexes live sessions by id, and
//! [`ConnectionDriver`] runs the per-connection abuse-control guard.

pub mod cipher;
pub mod client;
pub mod flags;
pub mod guard;
pub mod params;
pub mod store;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;

use crate::config::{DEFAULT_SEND_QUEUE, MAX_FRAME_SIZE};
use crate::core::command::TransportKind;
use crate::utils::timeout;

pub use cipher::{FrameCipher, Rc4Cipher, XChaChaCipher};
pub use client::Session;
pub use flags::Flags;
pub use guard::{ConnectionDriver, FrameHandler, GuardExit, GuardPolicy};
pub use params::Params;
pub use store::Store;

/// Any byte stream a session can run over
pub trait RawStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> RawStream for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

pub type BoxedStream = Box<dyn RawStream>;

/// An accepted connection, before it is bound to a session
pub enum Connection {
    /// Length-prefixed frames over a byte stream
    Stream {
        io: BoxedStream,
        peer: Option<SocketAddr>,
    },
    /// One binary message per frame; the body keeps the length prefix
    WebSocket {
        ws: WebSocketStream<BoxedStream>,
        peer: Option<SocketAddr>,
    },
}

impl Connection {
    pub fn stream<S: RawStream>(io: S, peer: Option<SocketAddr>) -> Self {
        Connection::Stream {
            io: Box::new(io),
            peer,
        }
    }

    pub fn websocket(ws: WebSocketStream<BoxedStream>, peer: Option<SocketAddr>) -> Self {
        Connection::WebSocket { ws, peer }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Connection::Stream { .. } => TransportKind::Socket,
            Connection::WebSocket { .. } => TransportKind::WebSocket,
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        match self {
            Connection::Stream { peer, .. } | Connection::WebSocket { peer, .. } => *peer,
        }
    }
}

/// Per-session transport settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Deadline re-armed before every read
    pub read_deadline: Duration,
    /// Deadline for every write; zero disables it
    pub write_deadline: Duration,
    /// Largest WebSocket message accepted, prefix included
    pub max_message_size: usize,
    /// Depth of the outbound queue
    pub send_queue_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            read_deadline: timeout::DEFAULT_READ_DEADLINE,
            write_deadline: Duration::ZERO,
            max_message_size: MAX_FRAME_SIZE + 2,
            send_queue_capacity: DEFAULT_SEND_QUEUE,
        }
    }
}
