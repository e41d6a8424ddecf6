//! # Edge Gateway
//!
//! Building blocks for the connection-facing edge of a game server:
//!
//! - **Wire codec** ([`core`]): a big-endian byte buffer, request/response
//!   frames with a 9-byte header, structured error records and the `u16`
//!   length-prefix codec shared by TCP and WebSocket transports.
//! - **Session engine** ([`session`]): one duplex session per connection with a
//!   bounded outbound queue, an encryption state machine, idempotent kick and a
//!   per-connection abuse-control guard.
//! - **Listeners** ([`transport`]): raw TCP and WebSocket acceptors with
//!   graceful shutdown.
//! - **Runtime container** ([`runtime`]): long-lived actors started in
//!   registration order and closed in reverse.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use edge_gateway::config::GatewayConfig;
//! use edge_gateway::protocol::Dispatcher;
//! use edge_gateway::service::Gateway;
//!
//! # async fn run() -> edge_gateway::error::Result<()> {
//! let dispatcher = Dispatcher::new();
//! dispatcher.register(1, 1, |_session, req| Ok(req.payload.clone()))?;
//!
//! let gateway = Gateway::new(GatewayConfig::default(), Arc::new(dispatcher))?;
//! gateway.run().await
//! # }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod runtime;
pub mod service;
pub mod session;
pub mod transport;
pub mod utils;

pub use crate::config::GatewayConfig;
pub use crate::core::command::{Command, TransportKind};
pub use crate::core::request::Request;
pub use crate::core::response::{ErrorRecord, Response};
pub use crate::error::{GatewayError, Result};
pub use crate::protocol::Dispatcher;
pub use crate::runtime::{RuntimeActor, RuntimeContainer};
pub use crate::service::Gateway;
pub use crate::session::{Connection, Flags, Session, Store};
