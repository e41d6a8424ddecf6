//! Chaos tests
//!
//! Drives a live socket listener with adverse clients: fragmented and jittered
//! writes, truncated frames, silent peers, slow readers and connection bursts.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use edge_gateway::config::{GuardConfig, SocketConfig};
use edge_gateway::core::codec::FrameCodec;
use edge_gateway::protocol::Dispatcher;
use edge_gateway::session::Store;
use edge_gateway::transport::SocketListener;
use edge_gateway::{Request, Response};
use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tokio_util::codec::{Encoder, Framed};

struct Server {
    listener: Arc<SocketListener>,
    store: Arc<Store>,
    addr: SocketAddr,
}

impl Drop for Server {
    fn drop(&mut self) {
        self.listener.shutdown();
    }
}

async fn serve(guard: GuardConfig) -> Server {
    let dispatcher = Dispatcher::new();
    dispatcher
        .register(10, 1, |_, req| Ok(req.payload.clone()))
        .unwrap();

    let store = Arc::new(Store::new());
    let config = SocketConfig {
        address: "127.0.0.1:0".into(),
        ..SocketConfig::default()
    };
    let listener = Arc::new(SocketListener::new(
        config,
        &guard,
        Arc::clone(&store),
        Arc::new(dispatcher),
    ));
    let tcp = listener.bind().unwrap();
    let addr = tcp.local_addr().unwrap();

    let l = Arc::clone(&listener);
    tokio::spawn(async move { l.serve_on(tcp).await });

    Server {
        listener,
        store,
        addr,
    }
}

async fn drained(store: &Store) {
    timeout(Duration::from_secs(10), async {
        while !store.is_empty() {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("sessions released");
}

#[tokio::test]
async fn test_fragmented_writes_with_jitter() {
    let server = serve(GuardConfig::default()).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let mut wire = BytesMut::new();
    for seq in 1..=50u32 {
        let req = Request::new(seq, 10, 1, vec![seq as u8; (seq * 37) as usize]);
        FrameCodec.encode(req.marshal().unwrap(), &mut wire).unwrap();
    }

    let (mut rd, mut wr) = stream.split();
    let writer = async {
        let mut rest = &wire[..];
        while !rest.is_empty() {
            let (n, pause) = {
                let mut rng = rand::rng();
                (
                    rng.random_range(1..=rest.len().min(97)),
                    rng.random_range(0..3u64),
                )
            };
            wr.write_all(&rest[..n]).await.unwrap();
            rest = &rest[n..];
            sleep(Duration::from_millis(pause)).await;
        }
    };
    let reader = async {
        let mut frames = tokio_util::codec::FramedRead::new(&mut rd, FrameCodec);
        let mut seen = Vec::new();
        while seen.len() < 50 {
            let frame = frames.next().await.unwrap().unwrap();
            let resp = Response::unmarshal(&frame).unwrap();
            assert_eq!(resp.payload.len(), (resp.seq_id * 37) as usize);
            seen.push(resp.seq_id);
        }
        seen
    };

    let (_, seen) = timeout(Duration::from_secs(10), async { tokio::join!(writer, reader) })
        .await
        .expect("all replies in time");
    assert_eq!(seen, (1..=50).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_truncated_frame_then_disconnect() {
    let server = serve(GuardConfig::default()).await;

    for _ in 0..10 {
        let mut stream = TcpStream::connect(server.addr).await.unwrap();
        // Prefix promises 10 bytes; only 3 arrive before the peer vanishes
        stream.write_all(&[0, 10, 1, 2, 3]).await.unwrap();
        drop(stream);
    }

    sleep(Duration::from_millis(50)).await;
    drained(&server.store).await;
    assert_eq!(server.store.metrics().snapshot().sessions_total, 10);
}

#[tokio::test]
async fn test_silent_peer_is_dropped() {
    let guard = GuardConfig {
        handshake_grace: Duration::from_secs(1),
        absolute_grace: Duration::from_secs(2),
        rate_window: Duration::from_secs(60),
    };
    let server = serve(guard).await;
    let mut stream = TcpStream::connect(server.addr).await.unwrap();

    let mut buf = [0u8; 16];
    let n = timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("server closes idle connection")
        .unwrap_or(0);
    assert_eq!(n, 0);

    drained(&server.store).await;
    assert_eq!(server.store.metrics().snapshot().guard_terminations, 1);
}

#[tokio::test]
async fn test_slow_reader_does_not_stall_server() {
    let server = serve(GuardConfig::default()).await;

    // Floods requests without ever reading replies
    let mut slow = TcpStream::connect(server.addr).await.unwrap();
    let big = Request::new(1, 10, 1, vec![7u8; 60_000]).marshal().unwrap();
    let mut wire = BytesMut::new();
    FrameCodec.encode(big, &mut wire).unwrap();
    for _ in 0..50 {
        if timeout(Duration::from_millis(200), slow.write_all(&wire))
            .await
            .is_err()
        {
            break;
        }
    }

    // A well-behaved client is still served promptly
    let mut fast = Framed::new(TcpStream::connect(server.addr).await.unwrap(), FrameCodec);
    fast.send(Request::new(9, 10, 1, &b"ping"[..]).marshal().unwrap())
        .await
        .unwrap();
    let frame = timeout(Duration::from_secs(2), fast.next())
        .await
        .expect("reply in time")
        .unwrap()
        .unwrap();
    assert_eq!(Response::unmarshal(&frame).unwrap().payload, &b"ping"[..]);

    drop(slow);
    drop(fast);
    drained(&server.store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_connection_burst() {
    let server = serve(GuardConfig::default()).await;
    let mut clients = Vec::new();

    for i in 0..100u32 {
        let addr = server.addr;
        clients.push(tokio::spawn(async move {
            let mut c = Framed::new(TcpStream::connect(addr).await.unwrap(), FrameCodec);
            let payload = i.to_be_bytes().to_vec();
            c.send(Request::new(i + 1, 10, 1, payload.clone()).marshal().unwrap())
                .await
                .unwrap();
            let frame = c.next().await.unwrap().unwrap();
            let resp = Response::unmarshal(&frame).unwrap();
            assert_eq!(resp.seq_id, i + 1);
            assert_eq!(resp.payload, payload);
        }));
    }

    timeout(Duration::from_secs(10), async {
        for c in clients {
            c.await.unwrap();
        }
    })
    .await
    .expect("burst served in time");

    drained(&server.store).await;
    let snapshot = server.store.metrics().snapshot();
    assert_eq!(snapshot.sessions_total, 100);
    assert_eq!(snapshot.sessions_active, 0);
}
