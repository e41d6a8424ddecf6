//! Minimal gateway: echo on (10, 1), a login on (1, 1) and a key exchange on
//! (2, 1). Pass a TOML file path to override the defaults; Ctrl-C shuts down.
//!
//! ```text
//! cargo run --example echo_gateway -- gateway.toml
//! ```

use std::sync::Arc;

use bytes::Bytes;
use edge_gateway::config::{GatewayConfig, WebSocketConfig};
use edge_gateway::error::{GatewayError, Result};
use edge_gateway::protocol::Dispatcher;
use edge_gateway::service::Gateway;
use edge_gateway::session::cipher::generate_key;
use edge_gateway::session::{Flags, Store, XChaChaCipher};
use edge_gateway::utils::logging::init_logging;
use tracing::{info, warn};

fn dispatcher(store: Arc<Store>) -> Result<Dispatcher> {
    let d = Dispatcher::new();

    d.register(10, 1, |_, req| Ok(req.payload.clone()))?;

    // The key travels in clear here; a real deployment derives it from an
    // exchange with the client.
    d.register(2, 1, |session, _| {
        let key = generate_key();
        session.install_ciphers(
            Box::new(XChaChaCipher::new(&key)),
            Box::new(XChaChaCipher::new(&key)),
        )?;
        session.insert_flags(Flags::KEY_EXCHANGED);
        Ok(Bytes::copy_from_slice(&key))
    })?;

    d.register(1, 1, move |session, req| {
        let uid = String::from_utf8_lossy(&req.payload).trim().to_string();
        if uid.is_empty() {
            return Err(GatewayError::Application("401".into()));
        }
        store.rebind(&session.id(), uid.clone())?;
        session.insert_flags(Flags::AUTHORIZED);
        info!(%uid, "Player logged in");
        Ok(Bytes::from(uid))
    })?;

    Ok(d)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => GatewayConfig::from_file(path)?,
        None => GatewayConfig::default_with_overrides(|c| {
            c.websocket = Some(WebSocketConfig::default());
        }),
    };
    init_logging(&config.logging)?;

    let store = Arc::new(Store::new());
    let handler = Arc::new(dispatcher(Arc::clone(&store))?);
    let gateway = Arc::new(Gateway::with_store(config, store, handler)?);

    let g = Arc::clone(&gateway);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => g.shutdown(),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    gateway.run().await
}
