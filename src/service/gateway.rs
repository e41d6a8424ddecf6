use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::runtime::{RuntimeActor, RuntimeContainer};
use crate::session::{FrameHandler, Store};
use crate::transport::{SocketListener, WebSocketListener};
use crate::utils::Metrics;

/// Period of the metrics log line
pub const METRICS_INTERVAL: Duration = Duration::from_secs(60);

/// A configured gateway: session store, listeners and background actors in
/// one runtime container.
///
/// Actors added with [`add_actor`](Self::add_actor) before [`run`](Self::run)
/// start ahead of the listeners and are closed after them.
pub struct Gateway {
    config: GatewayConfig,
    store: Arc<Store>,
    handler: Arc<dyn FrameHandler>,
    container: RuntimeContainer,
    listeners_added: AtomicBool,
}

impl Gateway {
    pub fn new(config: GatewayConfig, handler: Arc<dyn FrameHandler>) -> Result<Self> {
        Self::with_store(config, Arc::new(Store::new()), handler)
    }

    /// Like [`new`](Self::new), sharing a store the handler already holds
    pub fn with_store(
        config: GatewayConfig,
        store: Arc<Store>,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<Self> {
        config.validate_strict()?;

        let container = RuntimeContainer::new();
        container.add(metrics_reporter(Arc::clone(store.metrics())), true);

        Ok(Self {
            config,
            store,
            handler,
            container,
            listeners_added: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn container(&self) -> &RuntimeContainer {
        &self.container
    }

    /// Register a background actor that starts on the next [`run`](Self::run)
    pub fn add_actor(&self, actor: RuntimeActor) -> u32 {
        self.container.add(actor, true)
    }

    /// Start all actors and listeners, returning when every one has stopped.
    #[instrument(skip(self), fields(app = %self.config.logging.app_name))]
    pub async fn run(&self) -> Result<()> {
        if !self.listeners_added.swap(true, Ordering::AcqRel) {
            self.add_listeners();
        }
        info!("Gateway starting");
        let res = self.container.run().await;
        self.store.metrics().log_metrics();
        info!(ok = res.is_ok(), "Gateway stopped");
        res
    }

    /// Close listeners first, then the actors registered before them
    pub fn shutdown(&self) {
        info!(sessions = self.store.len(), "Gateway shutting down");
        self.container.stop();
    }

    fn add_listeners(&self) {
        if let Some(cfg) = &self.config.socket {
            let listener = Arc::new(SocketListener::new(
                cfg.clone(),
                &self.config.guard,
                Arc::clone(&self.store),
                Arc::clone(&self.handler),
            ));
            let closer = Arc::clone(&listener);
            self.container.add(
                RuntimeActor::new(
                    "socket",
                    move || async move { listener.serve().await },
                    |err| {
                        if let Some(e) = err {
                            error!(error = %e, "Socket listener exited");
                        }
                    },
                    move || closer.shutdown(),
                ),
                true,
            );
        }

        if let Some(cfg) = &self.config.websocket {
            let listener = Arc::new(WebSocketListener::new(
                cfg.clone(),
                &self.config.guard,
                Arc::clone(&self.store),
                Arc::clone(&self.handler),
            ));
            let closer = Arc::clone(&listener);
            self.container.add(
                RuntimeActor::new(
                    "websocket",
                    move || async move { listener.serve().await },
                    |err| {
                        if let Some(e) = err {
                            error!(error = %e, "WebSocket listener exited");
                        }
                    },
                    move || closer.shutdown(),
                ),
                true,
            );
        }
    }
}

fn metrics_reporter(metrics: Arc<Metrics>) -> RuntimeActor {
    let stop = CancellationToken::new();
    let closer = stop.clone();
    RuntimeActor::new(
        "metrics",
        move || async move {
            let mut ticker = interval_at(Instant::now() + METRICS_INTERVAL, METRICS_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => return Ok(()),
                    _ = ticker.tick() => metrics.log_metrics(),
                }
            }
        },
        |_| {},
        move || closer.cancel(),
    )
}
