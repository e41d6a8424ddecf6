//! Guard deadlines driven through the public connection API with paused time.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use edge_gateway::core::codec::FrameCodec;
use edge_gateway::protocol::Dispatcher;
use edge_gateway::session::{
    Connection, ConnectionDriver, Flags, GuardExit, GuardPolicy, Rc4Cipher, SessionOptions, Store,
};
use edge_gateway::{Request, Response, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

const KEY: &[u8] = b"shared-session-key";

fn dispatcher() -> Dispatcher {
    let d = Dispatcher::new();
    d.register(10, 1, |_, req| Ok(req.payload.clone())).unwrap();
    d.register(2, 1, |session, _| {
        session.install_ciphers(
            Box::new(Rc4Cipher::new(KEY)?),
            Box::new(Rc4Cipher::new(KEY)?),
        )?;
        session.insert_flags(Flags::KEY_EXCHANGED);
        Ok(Bytes::from_static(b"key-ok"))
    })
    .unwrap();
    d.register(1, 1, |session, _| {
        session.insert_flags(Flags::AUTHORIZED);
        Ok(Bytes::from_static(b"login-ok"))
    })
    .unwrap();
    d
}

/// Client side of one connection with its own RC4 pair once keyed
struct Peer {
    io: Framed<DuplexStream, FrameCodec>,
    enc: Option<Rc4Cipher>,
    dec: Option<Rc4Cipher>,
    seq: u32,
}

impl Peer {
    async fn call(&mut self, cmd: i16, sub: i16, payload: &'static [u8]) -> Response {
        self.seq += 1;
        let mut wire = Request::new(self.seq, cmd, sub, payload)
            .marshal()
            .unwrap()
            .to_vec();
        if let Some(enc) = self.enc.as_mut() {
            enc.apply_keystream(&mut wire);
        }
        self.io.send(Bytes::from(wire)).await.unwrap();

        let mut reply = self.io.next().await.unwrap().unwrap().to_vec();
        if let Some(dec) = self.dec.as_mut() {
            dec.apply_keystream(&mut reply);
        }
        Response::unmarshal(&reply).unwrap()
    }

    async fn handshake(&mut self) {
        let resp = self.call(2, 1, b"hello").await;
        assert_eq!(resp.payload, &b"key-ok"[..]);
        self.enc = Some(Rc4Cipher::new(KEY).unwrap());
        self.dec = Some(Rc4Cipher::new(KEY).unwrap());
    }
}

fn connect(
    store: &Arc<Store>,
    policy: GuardPolicy,
) -> (JoinHandle<Result<GuardExit>>, Peer, CancellationToken) {
    let driver = ConnectionDriver::new(
        Arc::clone(store),
        Arc::new(dispatcher()),
        SessionOptions::default(),
        policy,
    );
    let (server, client) = tokio::io::duplex(64 * 1024);
    let exit = CancellationToken::new();
    let e = exit.clone();
    let handle = tokio::spawn(async move {
        driver
            .serve(Connection::stream(server, None), Some("peer".into()), e)
            .await
    });
    let peer = Peer {
        io: Framed::new(client, FrameCodec),
        enc: None,
        dec: None,
        seq: 0,
    };
    (handle, peer, exit)
}

#[tokio::test(start_paused = true)]
async fn test_keyed_but_unauthorized_is_dropped_after_a_minute() {
    let store = Arc::new(Store::new());
    let (handle, mut peer, _exit) = connect(&store, GuardPolicy::default());

    peer.handshake().await;
    let echo = peer.call(10, 1, b"secret").await;
    assert_eq!(echo.payload, &b"secret"[..]);

    let session = store.get("peer").unwrap();
    assert!(session.flags().contains(Flags::ENCRYPTING));
    assert!(!session.flags().contains(Flags::KEY_EXCHANGED));

    assert_eq!(handle.await.unwrap().unwrap(), GuardExit::LoginTimeout);
    assert!(session.age() > Duration::from_secs(60));
    assert!(session.age() < Duration::from_secs(63));
    assert!(session.is_kicked());
    assert!(peer.io.next().await.is_none());
    assert!(store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_authorized_peer_outlives_grace_until_it_floods() {
    let store = Arc::new(Store::new());
    let (handle, mut peer, _exit) = connect(&store, GuardPolicy::default());

    peer.handshake().await;
    assert_eq!(peer.call(1, 1, b"uid").await.payload, &b"login-ok"[..]);

    tokio::time::sleep(Duration::from_secs(150)).await;
    let session = store.get("peer").expect("still online");
    assert!(session.is_authorized());
    assert!(!handle.is_finished());

    for _ in 0..250 {
        assert_eq!(peer.call(10, 1, b"x").await.payload, &b"x"[..]);
    }
    assert_eq!(handle.await.unwrap().unwrap(), GuardExit::RateLimited);
    assert_eq!(store.metrics().snapshot().guard_terminations, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_wins_over_pending_deadlines() {
    let store = Arc::new(Store::new());
    let (handle, mut peer, exit) = connect(&store, GuardPolicy::default());

    peer.handshake().await;
    tokio::time::sleep(Duration::from_secs(30)).await;
    exit.cancel();

    assert_eq!(handle.await.unwrap().unwrap(), GuardExit::Shutdown);
    assert_eq!(store.metrics().snapshot().guard_terminations, 0);
}
