//! End-to-end tests over real TCP: listener, session engine and dispatcher.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use edge_gateway::config::{GuardConfig, SocketConfig};
use edge_gateway::core::codec::FrameCodec;
use edge_gateway::error::{GatewayError, Result};
use edge_gateway::protocol::{Dispatcher, CODE_NOT_FOUND};
use edge_gateway::session::{Flags, Store};
use edge_gateway::transport::SocketListener;
use edge_gateway::{Request, Response};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;

type Client = Framed<TcpStream, FrameCodec>;

struct Harness {
    listener: Arc<SocketListener>,
    store: Arc<Store>,
    addr: SocketAddr,
    handle: JoinHandle<Result<()>>,
}

fn dispatcher(store: &Arc<Store>) -> Dispatcher {
    let d = Dispatcher::new();
    d.register(10, 1, |_, req| Ok(req.payload.clone())).unwrap();
    d.register(10, 2, |_, _| Err(GatewayError::Application("4001".into())))
        .unwrap();

    let store = Arc::clone(store);
    d.register(1, 1, move |session, req| {
        let uid = String::from_utf8_lossy(&req.payload).into_owned();
        session.insert_flags(Flags::AUTHORIZED);
        store.rebind(&session.id(), uid)?;
        Ok(Bytes::from_static(b"welcome"))
    })
    .unwrap();
    d
}

async fn start() -> Harness {
    let store = Arc::new(Store::new());
    let config = SocketConfig {
        address: "127.0.0.1:0".into(),
        shutdown_timeout: Duration::from_secs(2),
        ..SocketConfig::default()
    };
    let listener = Arc::new(SocketListener::new(
        config,
        &GuardConfig::default(),
        Arc::clone(&store),
        Arc::new(dispatcher(&store)),
    ));

    let tcp = listener.bind().unwrap();
    let addr = tcp.local_addr().unwrap();
    let l = Arc::clone(&listener);
    let handle = tokio::spawn(async move { l.serve_on(tcp).await });

    Harness {
        listener,
        store,
        addr,
        handle,
    }
}

async fn connect(addr: SocketAddr) -> Client {
    Framed::new(TcpStream::connect(addr).await.unwrap(), FrameCodec)
}

async fn call(client: &mut Client, req: Request) -> Response {
    client.send(req.marshal().unwrap()).await.unwrap();
    let frame = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("response in time")
        .expect("connection open")
        .unwrap();
    Response::unmarshal(&frame).unwrap()
}

async fn expect_closed(client: &mut Client) {
    let next = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("close in time");
    assert!(!matches!(next, Some(Ok(_))), "expected the server to close");
}

async fn wait_for<F: Fn() -> bool>(cond: F) {
    timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition in time");
}

#[tokio::test]
async fn test_request_response_roundtrip() {
    let h = start().await;
    let mut client = connect(h.addr).await;

    let resp = call(&mut client, Request::new(1, 10, 1, &b"hello"[..])).await;
    assert_eq!(resp.seq_id, 1);
    assert_eq!(resp.payload, &b"hello"[..]);
    assert!(!resp.is_error());

    let resp = call(&mut client, Request::new(2, 10, 2, &b"x"[..])).await;
    assert!(resp.is_error());
    assert_eq!(resp.error_code(), 4001);
    assert_eq!(resp.error_record().unwrap().sub_command, 2);

    let resp = call(&mut client, Request::new(3, 77, 1, &b"x"[..])).await;
    assert_eq!(resp.error_code(), CODE_NOT_FOUND);

    h.listener.shutdown();
    h.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_login_rebinds_session() {
    let h = start().await;
    let mut client = connect(h.addr).await;

    let resp = call(&mut client, Request::new(1, 1, 1, &b"uid-42"[..])).await;
    assert_eq!(resp.payload, &b"welcome"[..]);

    let session = h.store.get("uid-42").expect("session rebound");
    assert!(session.flags().contains(Flags::AUTHORIZED));
    assert_eq!(h.store.len(), 1);

    // Kicking through the store closes the client's connection
    assert!(h.store.remove_and_exit("uid-42"));
    expect_closed(&mut client).await;

    h.listener.shutdown();
    h.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_request_closes_connection() {
    let h = start().await;
    let mut client = connect(h.addr).await;

    // Header with a zero sequence id
    client
        .send(Bytes::from_static(&[1, 0, 0, 0, 0, 0, 1, 0, 1, 0xAA]))
        .await
        .unwrap();
    expect_closed(&mut client).await;

    let store = Arc::clone(&h.store);
    wait_for(move || store.is_empty()).await;
    assert_eq!(h.store.metrics().snapshot().protocol_errors, 1);

    h.listener.shutdown();
    h.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_live_connections() {
    let h = start().await;
    let mut a = connect(h.addr).await;
    let mut b = connect(h.addr).await;

    let store = Arc::clone(&h.store);
    wait_for(move || store.len() == 2).await;
    assert!(h.listener.is_running());

    h.listener.shutdown();
    expect_closed(&mut a).await;
    expect_closed(&mut b).await;
    h.handle.await.unwrap().unwrap();

    assert!(h.store.is_empty());
    assert!(!h.listener.is_running());
}

#[tokio::test]
async fn test_second_serve_is_rejected() {
    let h = start().await;
    let l = Arc::clone(&h.listener);
    wait_for(move || l.is_running()).await;

    let extra = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let err = h.listener.serve_on(extra).await.unwrap_err();
    assert!(matches!(err, GatewayError::RuntimeError(_)));

    h.listener.shutdown();
    h.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_idle_socket_gets_no_keepalive_bytes() {
    use tokio::io::AsyncReadExt;

    let h = start().await;
    let mut stream = TcpStream::connect(h.addr).await.unwrap();
    wait_for(|| h.store.len() == 1).await;

    let mut buf = [0u8; 16];
    let read = timeout(Duration::from_millis(2500), stream.read(&mut buf)).await;
    assert!(read.is_err(), "raw sockets must stay silent while idle");
    assert_eq!(h.store.len(), 1);
}
