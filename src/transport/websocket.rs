//! # WebSocket Listener
//!
//! Accepts HTTP upgrades on a single path. Requests for any other path are
//! answered with 404 and dropped. After the upgrade every binary message is
//! one frame, still carrying its `u16` length prefix.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig as WsConfig;
use tokio_tungstenite::{accept_hdr_async_with_config, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{GuardConfig, WebSocketConfig};
use crate::error::constants::ERR_LISTENER_RUNNING;
use crate::error::{GatewayError, Result};
use crate::session::{BoxedStream, Connection, ConnectionDriver, FrameHandler, GuardPolicy, Store};
use crate::utils::timeout::with_timeout_error;

use super::accept_loop;

pub struct WebSocketListener {
    config: WebSocketConfig,
    driver: ConnectionDriver,
    shutdown: CancellationToken,
    running: AtomicBool,
}

impl WebSocketListener {
    pub fn new(
        config: WebSocketConfig,
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

    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        Ok(TcpListener::bind(&self.config.address).await?)
    }

    /// Bind and serve until [`shutdown`](Self::shutdown)
    pub async fn serve(&self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve_on(listener).await
    }

    /// Serve on an already bound listener until [`shutdown`](Self::shutdown)
    #[instrument(skip_all, fields(addr = ?listener.local_addr().ok(), path = %self.config.path))]
    pub async fn serve_on(&self, listener: TcpListener) -> Result<()> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(GatewayError::RuntimeError(ERR_LISTENER_RUNNING));
        }
        info!("WebSocket listener started");

        let driver = self.driver.clone();
        let config = self.config.clone();
        accept_loop(
            listener,
            &self.shutdown,
            self.config.shutdown_timeout,
            move |stream, peer, exit| {
                let driver = driver.clone();
                let config = config.clone();
                async move {
                    let ws = match upgrade(stream, &config).await {
                        Ok(ws) => ws,
                        Err(e) => {
                            debug!(%peer, error = %e, "WebSocket upgrade failed");
                            return;
                        }
                    };
                    let conn = Connection::websocket(ws, Some(peer));
                    match driver.serve(conn, None, exit).await {
                        Ok(reason) => debug!(%peer, %reason, "Connection finished"),
                        Err(e) => warn!(%peer, error = %e, "Connection failed"),
                    }
                }
            },
        )
        .await;

        self.running.store(false, Ordering::Release);
        info!("WebSocket listener stopped");
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

async fn upgrade(
    stream: TcpStream,
    config: &WebSocketConfig,
) -> Result<WebSocketStream<BoxedStream>> {
    let io: BoxedStream = Box::new(stream);
    let path = config.path.clone();
    let check_path = move |req: &Request, resp: Response| {
        if req.uri().path() == path {
            Ok(resp)
        } else {
            let mut err = ErrorResponse::new(Some(String::from("Not Found")));
            *err.status_mut() = StatusCode::NOT_FOUND;
            Err(err)
        }
    };

    // Oversized messages fail while the frame header is read, before buffering
    let limits = WsConfig::default()
        .max_message_size(Some(config.max_message_size))
        .max_frame_size(Some(config.max_message_size));

    with_timeout_error(
        async {
            accept_hdr_async_with_config(io, check_path, Some(limits))
                .await
                .map_err(GatewayError::from)
        },
        config.handshake_timeout,
    )
    .await
}
