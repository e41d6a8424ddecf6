//! # Transport Layer
//!
//! Listeners that accept client connections and hand each one to a
//! [`ConnectionDriver`](crate::session::ConnectionDriver).
//!
//! ## Listeners
//! - **Socket**: raw TCP, `u16` length-prefixed frames
//! - **WebSocket**: HTTP upgrade on a fixed path, one binary message per frame
//!
//! Both stop accepting on shutdown, signal every live connection to close and
//! wait a bounded time for them to finish.

pub mod socket;
pub mod websocket;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

pub use socket::SocketListener;
pub use websocket::WebSocketListener;

/// Pause after a failed accept, e.g. when the process is out of descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Accept until `shutdown` fires, spawning `on_accept` per connection with a
/// token that is cancelled when the loop ends.
pub(crate) async fn accept_loop<F, Fut>(
    listener: TcpListener,
    shutdown: &CancellationToken,
    shutdown_timeout: Duration,
    on_accept: F,
) where
    F: Fn(TcpStream, SocketAddr, CancellationToken) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let exit = shutdown.child_token();
    let tracker = TaskTracker::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutting down listener. Waiting for connections to close...");
                break;
            }

            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!(%peer, error = %e, "Failed to set TCP_NODELAY");
                        }
                        tracker.spawn(on_accept(stream, peer, exit.clone()));
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }
    }

    drop(listener);
    exit.cancel();
    tracker.close();

    if tokio::time::timeout(shutdown_timeout, tracker.wait())
        .await
        .is_err()
    {
        warn!(connections = tracker.len(), "Shutdown timeout reached, forcing exit");
    } else {
        info!("All connections closed, listener stopped");
    }
}
