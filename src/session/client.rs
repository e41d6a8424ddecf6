//! A single connected client.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::codec::{Encoder, FramedRead};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::cipher::FrameCipher;
use super::flags::Flags;
use super::params::Params;
use super::{BoxedStream, Connection, SessionOptions};
use crate::config::MAX_FRAME_SIZE;
use crate::core::codec::{strip_prefix, FrameCodec, LENGTH_PREFIX};
use crate::core::command::TransportKind;
use crate::error::constants::{
    ERR_CIPHER_LOCK, ERR_CIPHER_NOT_SET, ERR_NON_BINARY_MESSAGE, ERR_SESSION_START,
};
use crate::error::{GatewayError, Result};
use crate::utils::timeout::{with_timeout_error, CLOSE_TIMEOUT, KEEPALIVE_INTERVAL};
use crate::utils::Metrics;

type Cipher = Mutex<Option<Box<dyn FrameCipher>>>;

/// A connected client: transport tasks, flags, cipher pair and parameters.
///
/// Always handled through `Arc<Session>`; the receiver and sender tasks hold a
/// reference until they exit.
pub struct Session {
    id: RwLock<Arc<str>>,
    kind: TransportKind,
    peer: Option<SocketAddr>,
    created_at: Instant,
    flags: AtomicU32,
    encoder: Cipher,
    decoder: Cipher,
    outbound: mpsc::Sender<Vec<u8>>,
    inbound: tokio::sync::Mutex<mpsc::Receiver<Bytes>>,
    die: CancellationToken,
    receiver_done: CancellationToken,
    sender_done: CancellationToken,
    params: Params,
    metrics: Arc<Metrics>,
}

impl Session {
    /// Bind `conn` to a new session and start its transport tasks.
    ///
    /// Returns once both tasks are running.
    pub(crate) async fn start(
        conn: Connection,
        id: String,
        opts: SessionOptions,
        metrics: Arc<Metrics>,
    ) -> Result<Arc<Session>> {
        let (out_tx, out_rx) = mpsc::channel(opts.send_queue_capacity.max(1));
        // Capacity 1 is the closest tokio gets to a rendezvous channel
        let (in_tx, in_rx) = mpsc::channel(1);

        let kind = conn.kind();
        let peer = conn.peer();
        let (reader, writer) = split_connection(conn);

        let session = Arc::new(Session {
            id: RwLock::new(Arc::from(id)),
            kind,
            peer,
            created_at: Instant::now(),
            flags: AtomicU32::new(0),
            encoder: Mutex::new(None),
            decoder: Mutex::new(None),
            outbound: out_tx,
            inbound: tokio::sync::Mutex::new(in_rx),
            die: CancellationToken::new(),
            receiver_done: CancellationToken::new(),
            sender_done: CancellationToken::new(),
            params: Params::new(),
            metrics,
        });

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(receive_loop(Arc::clone(&session), reader, in_tx, opts, ready_tx));
        if ready_rx.await.is_err() {
            session.kick();
            return Err(GatewayError::RuntimeError(ERR_SESSION_START));
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(send_loop(Arc::clone(&session), writer, out_rx, opts, ready_tx));
        if ready_rx.await.is_err() {
            session.kick();
            return Err(GatewayError::RuntimeError(ERR_SESSION_START));
        }

        trace!(sid = %session.id(), transport = %kind, "Session tasks started");
        Ok(session)
    }

    pub fn id(&self) -> Arc<str> {
        match self.id.read() {
            Ok(id) => Arc::clone(&id),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub(crate) fn set_id(&self, id: Arc<str>) {
        match self.id.write() {
            Ok(mut guard) => *guard = id,
            Err(poisoned) => *poisoned.into_inner() = id,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn flags(&self) -> Flags {
        Flags::from_bits(self.flags.load(Ordering::Acquire))
    }

    /// Set bits, returning the previous flags. `KICKED_OUT` is only set by [`kick`](Self::kick).
    pub fn insert_flags(&self, flags: Flags) -> Flags {
        let bits = (flags & !Flags::KICKED_OUT).bits();
        Flags::from_bits(self.flags.fetch_or(bits, Ordering::AcqRel))
    }

    /// Clear bits, returning the previous flags. `KICKED_OUT` is never cleared.
    pub fn remove_flags(&self, flags: Flags) -> Flags {
        let keep = !(flags & !Flags::KICKED_OUT);
        Flags::from_bits(self.flags.fetch_and(keep.bits(), Ordering::AcqRel))
    }

    /// Replace all non-sticky bits with `flags`
    pub fn set_flags(&self, flags: Flags) {
        let _ = self
            .flags
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                let sticky = Flags::from_bits(old) & Flags::KICKED_OUT;
                Some(((flags & !Flags::KICKED_OUT) | sticky).bits())
            });
    }

    pub fn is_kicked(&self) -> bool {
        self.flags().contains(Flags::KICKED_OUT)
    }

    pub fn is_authorized(&self) -> bool {
        self.flags().contains(Flags::AUTHORIZED)
    }

    pub fn is_encrypting(&self) -> bool {
        self.flags().contains(Flags::ENCRYPTING)
    }

    /// Install the cipher pair used once the session is encrypting.
    ///
    /// Call before setting [`Flags::KEY_EXCHANGED`]; the handshake reply is the
    /// last frame sent in clear.
    pub fn install_ciphers(
        &self,
        encoder: Box<dyn FrameCipher>,
        decoder: Box<dyn FrameCipher>,
    ) -> Result<()> {
        *self
            .encoder
            .lock()
            .map_err(|_| GatewayError::CipherError(ERR_CIPHER_LOCK))? = Some(encoder);
        *self
            .decoder
            .lock()
            .map_err(|_| GatewayError::CipherError(ERR_CIPHER_LOCK))? = Some(decoder);
        Ok(())
    }

    /// Move `KEY_EXCHANGED` to `ENCRYPTING` in one step, keeping every other bit.
    pub(crate) fn begin_encrypting(&self) -> bool {
        self.flags
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                let f = Flags::from_bits(old);
                f.contains(Flags::KEY_EXCHANGED)
                    .then(|| ((f & !Flags::KEY_EXCHANGED) | Flags::ENCRYPTING).bits())
            })
            .is_ok()
    }

    /// Queue a frame for the sender without blocking.
    ///
    /// Fails with [`GatewayError::ChannelFull`] when the outbound queue is full
    /// and [`GatewayError::SessionClosed`] once the session is kicked.
    pub fn send(&self, frame: impl Into<Vec<u8>>) -> Result<()> {
        if self.is_kicked() {
            return Err(GatewayError::SessionClosed);
        }
        let frame = frame.into();
        if frame.is_empty() {
            return Ok(());
        }
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.metrics.backpressure_drop();
                warn!(sid = %self.id(), "Outbound queue full, frame dropped");
                Err(GatewayError::ChannelFull)
            }
            Err(TrySendError::Closed(_)) => Err(GatewayError::SessionClosed),
        }
    }

    /// Next inbound frame, still encrypted if the session is encrypting.
    /// `None` once the receiver has stopped.
    pub async fn recv(&self) -> Option<Bytes> {
        self.inbound.lock().await.recv().await
    }

    /// Decrypt `frame` when encrypting, then hand it to `route`.
    pub fn call<R, F>(&self, frame: Bytes, route: F) -> Result<R>
    where
        F: FnOnce(&Session, Bytes) -> Result<R>,
    {
        let frame = if self.is_encrypting() {
            let mut buf = frame.to_vec();
            self.decoder
                .lock()
                .map_err(|_| GatewayError::CipherError(ERR_CIPHER_LOCK))?
                .as_mut()
                .ok_or(GatewayError::CipherError(ERR_CIPHER_NOT_SET))?
                .decrypt(&mut buf)?;
            Bytes::from(buf)
        } else {
            frame
        };
        route(self, frame)
    }

    /// Terminate the session. Returns `false` if it was already kicked.
    pub fn kick(&self) -> bool {
        let prev = Flags::from_bits(
            self.flags
                .fetch_or(Flags::KICKED_OUT.bits(), Ordering::AcqRel),
        );
        if prev.contains(Flags::KICKED_OUT) {
            return false;
        }
        self.die.cancel();
        self.metrics.kick();
        debug!(sid = %self.id(), "Session kicked");
        true
    }

    pub fn is_closed(&self) -> bool {
        self.die.is_cancelled()
    }

    /// Resolves once the session is kicked
    pub async fn closed(&self) {
        self.die.cancelled().await
    }

    /// Resolves once the receiver task has exited
    pub async fn receiver_stopped(&self) {
        self.receiver_done.cancelled().await
    }

    /// Resolves once the sender task has exited
    pub async fn sender_stopped(&self) {
        self.sender_done.cancelled().await
    }

    /// Wait up to `limit` for both transport tasks to exit
    pub async fn join(&self, limit: Duration) -> bool {
        tokio::time::timeout(limit, async {
            self.receiver_done.cancelled().await;
            self.sender_done.cancelled().await;
        })
        .await
        .is_ok()
    }

    /// Apply the outbound half of the encryption state machine.
    ///
    /// `None` means the frame cannot fit the length prefix and was dropped.
    fn seal(&self, mut frame: Vec<u8>) -> Result<Option<Vec<u8>>> {
        let flags = self.flags();
        if flags.contains(Flags::ENCRYPTING) {
            let mut guard = self
                .encoder
                .lock()
                .map_err(|_| GatewayError::CipherError(ERR_CIPHER_LOCK))?;
            let cipher = guard
                .as_mut()
                .ok_or(GatewayError::CipherError(ERR_CIPHER_NOT_SET))?;
            if frame.len() + cipher.overhead() > MAX_FRAME_SIZE {
                warn!(sid = %self.id(), len = frame.len(), "Oversized frame dropped");
                return Ok(None);
            }
            cipher.encrypt(&mut frame)?;
        } else {
            if frame.len() > MAX_FRAME_SIZE {
                warn!(sid = %self.id(), len = frame.len(), "Oversized frame dropped");
                return Ok(None);
            }
            if flags.contains(Flags::KEY_EXCHANGED) {
                // This frame is the handshake reply and leaves in clear
                self.begin_encrypting();
            }
        }
        Ok(Some(frame))
    }

    async fn write_frame(
        &self,
        writer: &mut FrameWriter,
        scratch: &mut BytesMut,
        frame: Vec<u8>,
        deadline: Duration,
    ) -> Result<()> {
        let Some(frame) = self.seal(frame)? else {
            return Ok(());
        };
        scratch.clear();
        FrameCodec.encode(&frame[..], scratch)?;
        writer.write(scratch, deadline).await?;
        self.metrics.frame_sent(frame.len());
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id())
            .field("kind", &self.kind)
            .field("peer", &self.peer)
            .field("flags", &self.flags())
            .finish()
    }
}

enum FrameReader {
    Stream(FramedRead<ReadHalf<BoxedStream>, FrameCodec>),
    WebSocket(SplitStream<WebSocketStream<BoxedStream>>),
}

enum FrameWriter {
    Stream(WriteHalf<BoxedStream>),
    WebSocket(SplitSink<WebSocketStream<BoxedStream>, Message>),
}

fn split_connection(conn: Connection) -> (FrameReader, FrameWriter) {
    match conn {
        Connection::Stream { io, .. } => {
            let (rd, wr) = tokio::io::split(io);
            (
                FrameReader::Stream(FramedRead::new(rd, FrameCodec)),
                FrameWriter::Stream(wr),
            )
        }
        Connection::WebSocket { ws, .. } => {
            let (sink, stream) = ws.split();
            (FrameReader::WebSocket(stream), FrameWriter::WebSocket(sink))
        }
    }
}

/// One read from the peer
#[derive(Debug)]
enum Inbound {
    Frame(Bytes),
    /// Pong answering our keepalive ping; re-arms the read deadline
    Keepalive,
    Closed,
}

impl FrameReader {
    async fn next_frame(&mut self, max_message_size: usize) -> Result<Inbound> {
        match self {
            FrameReader::Stream(framed) => Ok(match framed.next().await.transpose()? {
                Some(frame) => Inbound::Frame(frame),
                None => Inbound::Closed,
            }),
            FrameReader::WebSocket(stream) => loop {
                let Some(msg) = stream.next().await else {
                    return Ok(Inbound::Closed);
                };
                match msg? {
                    Message::Binary(data) => {
                        if data.len() > max_message_size {
                            return Err(GatewayError::OversizedFrame(data.len()));
                        }
                        let len = strip_prefix(&data)?.len();
                        return Ok(Inbound::Frame(
                            data.slice(LENGTH_PREFIX..LENGTH_PREFIX + len),
                        ));
                    }
                    Message::Pong(_) => return Ok(Inbound::Keepalive),
                    Message::Ping(_) => continue,
                    Message::Close(_) => return Ok(Inbound::Closed),
                    Message::Text(_) | Message::Frame(_) => {
                        return Err(GatewayError::ProtocolViolation(ERR_NON_BINARY_MESSAGE));
                    }
                }
            },
        }
    }
}

impl FrameWriter {
    async fn write(&mut self, scratch: &mut BytesMut, deadline: Duration) -> Result<()> {
        match self {
            FrameWriter::Stream(wr) => {
                with_timeout_error(
                    async {
                        wr.write_all(&scratch[..]).await?;
                        wr.flush().await?;
                        Ok(())
                    },
                    deadline,
                )
                .await
            }
            FrameWriter::WebSocket(sink) => {
                let msg = Message::Binary(scratch.split().freeze());
                with_timeout_error(
                    async { sink.send(msg).await.map_err(GatewayError::from) },
                    deadline,
                )
                .await
            }
        }
    }

    async fn keepalive(&mut self, deadline: Duration) -> Result<()> {
        match self {
            FrameWriter::Stream(_) => Ok(()),
            FrameWriter::WebSocket(sink) => {
                with_timeout_error(
                    async {
                        sink.send(Message::Ping(Bytes::new()))
                            .await
                            .map_err(GatewayError::from)
                    },
                    deadline,
                )
                .await
            }
        }
    }

    async fn close(&mut self) {
        let _ = match self {
            FrameWriter::Stream(wr) => tokio::time::timeout(CLOSE_TIMEOUT, async {
                let _ = wr.shutdown().await;
            })
            .await,
            FrameWriter::WebSocket(sink) => tokio::time::timeout(CLOSE_TIMEOUT, async {
                let _ = sink.close().await;
            })
            .await,
        };
    }
}

async fn receive_loop(
    session: Arc<Session>,
    mut reader: FrameReader,
    inbound: mpsc::Sender<Bytes>,
    opts: SessionOptions,
    ready: oneshot::Sender<()>,
) {
    let _ = ready.send(());

    loop {
        let next = tokio::select! {
            _ = session.die.cancelled() => break,
            _ = session.sender_done.cancelled() => break,
            res = with_timeout_error(reader.next_frame(opts.max_message_size), opts.read_deadline) => res,
        };

        let frame = match next {
            Ok(Inbound::Frame(frame)) => frame,
            Ok(Inbound::Keepalive) => {
                trace!(sid = %session.id(), "Pong received");
                continue;
            }
            Ok(Inbound::Closed) => {
                debug!(sid = %session.id(), "Peer closed connection");
                break;
            }
            Err(GatewayError::Timeout) => {
                debug!(sid = %session.id(), "Read deadline expired");
                break;
            }
            Err(e) => {
                if e.is_protocol() {
                    session.metrics.protocol_error();
                } else {
                    session.metrics.transport_error();
                }
                debug!(sid = %session.id(), error = %e, "Receive failed");
                break;
            }
        };

        session.metrics.frame_received(frame.len());

        tokio::select! {
            _ = session.die.cancelled() => break,
            _ = session.sender_done.cancelled() => break,
            res = inbound.send(frame) => if res.is_err() { break },
        }

        if session.is_kicked() {
            break;
        }
    }

    session.receiver_done.cancel();
    trace!(sid = %session.id(), "Receiver exited");
}

async fn send_loop(
    session: Arc<Session>,
    mut writer: FrameWriter,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    opts: SessionOptions,
    ready: oneshot::Sender<()>,
) {
    let mut scratch = BytesMut::with_capacity(LENGTH_PREFIX + MAX_FRAME_SIZE);
    let mut ticker = interval_at(Instant::now() + KEEPALIVE_INTERVAL, KEEPALIVE_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let _ = ready.send(());

    loop {
        let res = tokio::select! {
            _ = session.die.cancelled() => break,
            _ = session.receiver_done.cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    session
                        .write_frame(&mut writer, &mut scratch, frame, opts.write_deadline)
                        .await
                }
                None => break,
            },
            _ = ticker.tick() => writer.keepalive(opts.write_deadline).await,
        };

        if let Err(e) = res {
            session.metrics.transport_error();
            debug!(sid = %session.id(), error = %e, "Send failed");
            break;
        }

        if session.is_kicked() {
            break;
        }
    }

    session.sender_done.cancel();
    writer.close().await;
    trace!(sid = %session.id(), "Sender exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::cipher::Rc4Cipher;
    use futures::SinkExt;
    use tokio::io::DuplexStream;
    use tokio_util::codec::FramedWrite;

    type ClientRead = FramedRead<ReadHalf<DuplexStream>, FrameCodec>;
    type ClientWrite = FramedWrite<WriteHalf<DuplexStream>, FrameCodec>;

    async fn pair(opts: SessionOptions, buf: usize) -> (Arc<Session>, ClientRead, ClientWrite) {
        let (server, client) = tokio::io::duplex(buf);
        let session = Session::start(
            Connection::stream(server, None),
            "s-1".to_string(),
            opts,
            Arc::new(Metrics::new()),
        )
        .await
        .unwrap();
        let (rd, wr) = tokio::io::split(client);
        (
            session,
            FramedRead::new(rd, FrameCodec),
            FramedWrite::new(wr, FrameCodec),
        )
    }

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (session, mut rd, mut wr) = pair(SessionOptions::default(), 4096).await;

        wr.send(Bytes::from_static(b"ping")).await.unwrap();
        assert_eq!(session.recv().await.unwrap(), &b"ping"[..]);

        session.send(b"pong".to_vec()).unwrap();
        assert_eq!(rd.next().await.unwrap().unwrap(), &b"pong"[..]);

        let m = session.metrics().snapshot();
        assert_eq!(m.frames_received, 1);
        assert_eq!(m.frames_sent, 1);
    }

    #[tokio::test]
    async fn test_kick_is_idempotent() {
        let (session, _rd, _wr) = pair(SessionOptions::default(), 4096).await;

        assert!(session.kick());
        assert!(!session.kick());
        assert!(session.is_kicked());
        assert!(session.join(Duration::from_secs(5)).await);
        assert!(matches!(
            session.send(b"late".to_vec()),
            Err(GatewayError::SessionClosed)
        ));
        assert_eq!(session.metrics().snapshot().kicks, 1);
    }

    #[tokio::test]
    async fn test_full_queue_rejects_without_blocking() {
        let opts = SessionOptions {
            send_queue_capacity: 2,
            ..SessionOptions::default()
        };
        // Tiny pipe and nobody reading: the sender blocks on its first write
        let (session, _rd, _wr) = pair(opts, 8).await;

        let mut accepted = 0;
        let mut rejected = false;
        for _ in 0..8 {
            match session.send(vec![7u8; 64]) {
                Ok(()) => accepted += 1,
                Err(GatewayError::ChannelFull) => {
                    rejected = true;
                    break;
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
            tokio::task::yield_now().await;
        }

        assert!(rejected);
        assert!(accepted >= 2);
        assert_eq!(session.metrics().snapshot().backpressure_drops, 1);
    }

    #[tokio::test]
    async fn test_handshake_reply_leaves_in_clear() {
        let (session, mut rd, mut wr) = pair(SessionOptions::default(), 4096).await;
        let down_key = b"downstream-key";
        let up_key = b"upstream-key";

        session
            .install_ciphers(
                Box::new(Rc4Cipher::new(down_key).unwrap()),
                Box::new(Rc4Cipher::new(up_key).unwrap()),
            )
            .unwrap();
        session.insert_flags(Flags::KEY_EXCHANGED);

        session.send(b"hello".to_vec()).unwrap();
        assert_eq!(rd.next().await.unwrap().unwrap(), &b"hello"[..]);

        let flags = session.flags();
        assert!(flags.contains(Flags::ENCRYPTING));
        assert!(!flags.contains(Flags::KEY_EXCHANGED));

        let mut client_dec = Rc4Cipher::new(down_key).unwrap();
        session.send(b"world".to_vec()).unwrap();
        let mut sealed = rd.next().await.unwrap().unwrap().to_vec();
        assert_ne!(sealed, b"world");
        client_dec.decrypt(&mut sealed).unwrap();
        assert_eq!(sealed, b"world");

        let mut client_enc = Rc4Cipher::new(up_key).unwrap();
        let mut up = b"move".to_vec();
        client_enc.encrypt(&mut up).unwrap();
        wr.send(Bytes::from(up)).await.unwrap();
        let raw = session.recv().await.unwrap();
        let opened = session.call(raw, |_, f| Ok(f)).unwrap();
        assert_eq!(opened, &b"move"[..]);
    }

    #[tokio::test]
    async fn test_encrypting_transition_keeps_kick() {
        let (session, _rd, _wr) = pair(SessionOptions::default(), 4096).await;
        session.insert_flags(Flags::KEY_EXCHANGED | Flags::AUTHORIZED);
        session.kick();

        assert!(session.begin_encrypting());
        let flags = session.flags();
        assert!(flags.contains(Flags::KICKED_OUT | Flags::ENCRYPTING | Flags::AUTHORIZED));
        assert!(!flags.contains(Flags::KEY_EXCHANGED));

        session.remove_flags(Flags::KICKED_OUT | Flags::AUTHORIZED);
        session.set_flags(Flags::empty());
        assert_eq!(session.flags(), Flags::KICKED_OUT);
    }

    #[tokio::test]
    async fn test_peer_close_stops_both_tasks() {
        let (session, rd, wr) = pair(SessionOptions::default(), 4096).await;
        drop(rd);
        drop(wr);

        assert!(session.join(Duration::from_secs(5)).await);
        assert!(session.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_deadline_stops_receiver() {
        let opts = SessionOptions {
            read_deadline: Duration::from_secs(2),
            ..SessionOptions::default()
        };
        let (session, _rd, _wr) = pair(opts, 4096).await;

        assert!(session.join(Duration::from_secs(10)).await);
        assert!(session.age() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_params_are_per_session() {
        let (session, _rd, _wr) = pair(SessionOptions::default(), 4096).await;
        session.params().set("uid", 1001u64);
        assert_eq!(*session.params().get::<u64>("uid").unwrap(), 1001);
    }
}
