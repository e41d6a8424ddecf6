//! Deadline defaults and async timeout helpers.

use std::future::Future;
use std::time::Duration;

use crate::error::{GatewayError, Result};

/// Default timeout for upgrades and one-off network operations
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default read deadline for an idle session
pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(310);

/// Interval of the sender's keepalive ticker (WebSocket ping)
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(1);

/// Time a listener waits for live connections after shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed to flush a close/shutdown to the peer
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Upper bound used when waiting on session tasks to acknowledge a kick
pub const SESSION_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `fut` under `duration`, mapping expiry to [`GatewayError::Timeout`].
/// A zero duration disables the deadline.
pub async fn with_timeout_error<F, T>(fut: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if duration.is_zero() {
        return fut.await;
    }
    match tokio::time::timeout(duration, fut).await {
        Ok(res) => res,
        Err(_) => Err(GatewayError::Timeout),
    }
}
