//! # Socket Listener
//!
//! Raw TCP listener. Accepted streams carry `u16` length-prefixed frames and
//! are served until they close, break a guard rule or the listener shuts down.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{GuardConfig, SocketConfig};
use crate::error::constants::ERR_LISTENER_RUNNING;
use crate::error::{GatewayError, Result};
use crate::session::{Connection, ConnectionDriver, FrameHandler, GuardPolicy, Store};

use super::accept_loop;

/// Pending-connection queue length passed to `listen(2)`
const BACKLOG: u32 = 1024;

pub struct SocketListener {
    config: SocketConfig,
    driver: ConnectionDriver,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl SocketListener {
    pub fn new(
        config: SocketConfig,
        guard: &GuardConfig,
        store: Arc<Store>,
        handler: Arc<dyn FrameHandler>,
    ) -> Self {
        let driver = ConnectionDriver::new(
            store,
            handler,
            config.session_options(),
            GuardPolicy::new(guard, config.rpm_limit),
        );
        Self {
            config,
            driver,
            shutdown: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    /// Bind the configured address with the configured kernel buffer sizes
    pub fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = self.config.address.parse().map_err(|e| {
            GatewayError::ConfigError(format!(
                "Invalid socket address '{}': {e}",
                self.config.address
            ))
        })?;

        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.set_reuseaddr(true)?;
        socket.set_recv_buffer_size(self.config.read_buffer_size)?;
        socket.set_send_buffer_size(self.config.write_buffer_size)?;
        socket.bind(addr)?;
        Ok(socket.listen(BACKLOG)?)
    }

    /// Bind and serve until [`shutdown`](Self::shutdown)
    pub async fn serve(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener until [`shutdown`](Self::shutdown)
    #[instrument(skip_all, fields(addr = ?listener.local_addr().ok()))]
    pub async fn serve_on(&self, listener: TcpListener) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(GatewayError::RuntimeError(ERR_LISTENER_RUNNING));
        }
        info!("Socket listener started");

        let driver = self.driver.clone();
        accept_loop(
            listener,
            &self.shutdown,
            self.config.shutdown_timeout,
            move |stream, peer, exit| {
                let driver = driver.clone();
                async move {
                    let conn = Connection::stream(stream, Some(peer));
                    match driver.serve(conn, None, exit).await {
                        Ok(reason) => debug!(%peer, %reason, "Connection finished"),
                        Err(e) => warn!(%peer, error = %e, "Connection failed"),
                    }
                }
            },
        )
        .await;

        self.running.store(false, Ordering::Release);
        info!("Socket listener stopped");
        Ok(())
    }

    /// Stop accepting and signal live connections to close. Not reversible.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}
