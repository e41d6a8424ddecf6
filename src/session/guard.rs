//! Per-connection abuse control and dispatch loop.
//!
//! Every accepted connection is driven by [`ConnectionDriver::serve`]: it
//! registers a session, feeds inbound frames to a [`FrameHandler`], and on a
//! one-second tick enforces the handshake deadline, the login deadline and, once
//! authorized, a per-window packet budget.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::client::Session;
use super::flags::Flags;
use super::store::Store;
use super::{Connection, SessionOptions};
use crate::config::{GuardConfig, DEFAULT_RPM_LIMIT};
use crate::error::{GatewayError, Result};
use crate::utils::{install_panic_backtrace_hook, panic_message, take_panic_backtrace};
use crate::utils::timeout::SESSION_JOIN_TIMEOUT;

const TICK: Duration = Duration::from_secs(1);

/// Handles one decrypted inbound frame. A returned frame is queued as the reply.
///
/// Errors for which [`GatewayError::is_fatal`] is true end the connection.
pub trait FrameHandler: Send + Sync + 'static {
    fn handle(&self, session: &Session, frame: Bytes) -> Result<Option<Bytes>>;
}

impl<F> FrameHandler for F
where
    F: Fn(&Session, Bytes) -> Result<Option<Bytes>> + Send + Sync + 'static,
{
    fn handle(&self, session: &Session, frame: Bytes) -> Result<Option<Bytes>> {
        self(session, frame)
    }
}

/// Abuse-control limits for one listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPolicy {
    /// Unauthorized sessions with no handshake progress are dropped after this
    pub handshake_grace: Duration,
    /// Unauthorized sessions are dropped after this
    pub absolute_grace: Duration,
    /// Packet counting window once authorized
    pub rate_window: Duration,
    /// Packets allowed per window
    pub rpm_limit: u32,
}

impl GuardPolicy {
    pub fn new(guard: &GuardConfig, rpm_limit: u32) -> Self {
        Self {
            handshake_grace: guard.handshake_grace,
            absolute_grace: guard.absolute_grace,
            rate_window: guard.rate_window,
            rpm_limit,
        }
    }
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self::new(&GuardConfig::default(), DEFAULT_RPM_LIMIT)
    }
}

/// Why a connection's guard loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardExit {
    /// The receiver stopped: peer closed, read deadline or transport error
    ReceiverStopped,
    /// The sender stopped on a write failure
    SenderStopped,
    /// Kicked from elsewhere, e.g. by the store
    Kicked,
    /// Listener shutdown
    Shutdown,
    /// No handshake progress within the handshake grace
    HandshakeTimeout,
    /// Not authorized within the absolute grace
    LoginTimeout,
    /// Packet budget exceeded
    RateLimited,
    /// Malformed frame or fatal handler error
    ProtocolError,
    /// Handler panicked
    HandlerPanic,
}

impl GuardExit {
    /// Terminations decided by the guard itself
    pub fn is_abuse(self) -> bool {
        matches!(
            self,
            GuardExit::HandshakeTimeout | GuardExit::LoginTimeout | GuardExit::RateLimited
        )
    }
}

impl fmt::Display for GuardExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GuardExit::ReceiverStopped => "receiver stopped",
            GuardExit::SenderStopped => "sender stopped",
            GuardExit::Kicked => "kicked",
            GuardExit::Shutdown => "shutdown",
            GuardExit::HandshakeTimeout => "handshake timeout",
            GuardExit::LoginTimeout => "login timeout",
            GuardExit::RateLimited => "rate limited",
            GuardExit::ProtocolError => "protocol error",
            GuardExit::HandlerPanic => "handler panic",
        };
        f.write_str(s)
    }
}

/// Everything needed to serve accepted connections for one listener
#[derive(Clone)]
pub struct ConnectionDriver {
    store: Arc<Store>,
    handler: Arc<dyn FrameHandler>,
    options: SessionOptions,
    policy: GuardPolicy,
}

impl ConnectionDriver {
    pub fn new(
        store: Arc<Store>,
        handler: Arc<dyn FrameHandler>,
        options: SessionOptions,
        policy: GuardPolicy,
    ) -> Self {
        Self {
            store,
            handler,
            options,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Serve one connection until it ends or `exit` is cancelled.
    ///
    /// The session is removed from the store and kicked before this returns.
    #[instrument(skip_all, fields(transport = %conn.kind(), peer = ?conn.peer()))]
    pub async fn serve(
        &self,
        conn: Connection,
        id: Option<String>,
        exit: CancellationToken,
    ) -> Result<GuardExit> {
        let session = self.store.new_session(conn, id, self.options).await?;
        info!(sid = %session.id(), "Session online");

        let reason = guard_loop(&session, &self.policy, self.handler.as_ref(), &exit).await;
        if reason.is_abuse() {
            session.metrics().guard_termination();
        }

        self.store.release(&session);
        if !session.join(SESSION_JOIN_TIMEOUT).await {
            warn!(sid = %session.id(), "Session tasks did not stop in time");
        }

        info!(sid = %session.id(), %reason, age = ?session.age(), "Session offline");
        Ok(reason)
    }
}

async fn guard_loop(
    session: &Session,
    policy: &GuardPolicy,
    handler: &dyn FrameHandler,
    exit: &CancellationToken,
) -> GuardExit {
    let started = Instant::now();
    let mut ticker = interval_at(started + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut packets: u32 = 0;
    let mut authorized_for = Duration::ZERO;

    loop {
        // Ticks first so a flooding peer cannot starve the budget check
        tokio::select! {
            biased;

            _ = ticker.tick() => {
                let flags = session.flags();
                if flags.contains(Flags::AUTHORIZED) {
                    authorized_for += TICK;
                    if authorized_for >= policy.rate_window {
                        if packets > policy.rpm_limit {
                            warn!(sid = %session.id(), packets, limit = policy.rpm_limit, "Packet rate exceeded");
                            return GuardExit::RateLimited;
                        }
                        packets = 0;
                        authorized_for = Duration::ZERO;
                    }
                } else {
                    let elapsed = started.elapsed();
                    if elapsed > policy.handshake_grace
                        && !flags.intersects(Flags::KEY_EXCHANGED | Flags::ENCRYPTING)
                    {
                        warn!(sid = %session.id(), ?elapsed, "No handshake, dropping connection");
                        return GuardExit::HandshakeTimeout;
                    }
                    if elapsed > policy.absolute_grace {
                        warn!(sid = %session.id(), ?elapsed, "Not authorized in time, dropping connection");
                        return GuardExit::LoginTimeout;
                    }
                }
            }
            _ = session.closed() => return GuardExit::Kicked,
            _ = exit.cancelled() => return GuardExit::Shutdown,
            _ = session.receiver_stopped() => return GuardExit::ReceiverStopped,
            frame = session.recv() => {
                let Some(frame) = frame else {
                    return GuardExit::ReceiverStopped;
                };
                packets = packets.saturating_add(1);
                if let Err(reason) = dispatch(session, frame, handler) {
                    return reason;
                }
            }
            _ = session.sender_stopped() => return GuardExit::SenderStopped,
        }
    }
}

/// Run the handler on one frame, recovering panics so one bad frame cannot
/// take the process down.
fn dispatch(
    session: &Session,
    frame: Bytes,
    handler: &dyn FrameHandler,
) -> std::result::Result<(), GuardExit> {
    install_panic_backtrace_hook();
    let _ = take_panic_backtrace();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        session.call(frame, |s, f| handler.handle(s, f))
    }));

    match outcome {
        Ok(Ok(Some(reply))) => match session.send(reply.to_vec()) {
            Ok(()) | Err(GatewayError::ChannelFull) => Ok(()),
            Err(_) => Err(GuardExit::Kicked),
        },
        Ok(Ok(None)) => Ok(()),
        Ok(Err(e)) if e.is_fatal() => {
            session.metrics().protocol_error();
            warn!(sid = %session.id(), error = %e, "Fatal frame error");
            Err(GuardExit::ProtocolError)
        }
        Ok(Err(e)) => {
            debug!(sid = %session.id(), error = %e, "Frame handler error");
            Ok(())
        }
        Err(payload) => {
            session.metrics().handler_panic();
            let backtrace = take_panic_backtrace()
                .map(|bt| bt.to_string())
                .unwrap_or_default();
            error!(
                sid = %session.id(),
                panic = %panic_message(payload.as_ref()),
                %backtrace,
                "Recovered panic in frame handler"
            );
            Err(GuardExit::HandlerPanic)
        }
    }
}
