//! Tests for the TCP reply endpoint.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rstest::{fixture, rstest};
use tokio::{
    net::TcpStream,
    time::{Duration, sleep, timeout},
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::{Bind, Endpoint, EndpointAddress, RepEndpoint, TcpBinder};
use crate::error::{BindError, ReceiveError, SendError};

type Client = Framed<TcpStream, LengthDelimitedCodec>;

#[fixture]
fn loopback() -> EndpointAddress { "tcp://127.0.0.1:0".parse().expect("loopback address") }

async fn bound(address: &EndpointAddress) -> RepEndpoint {
    TcpBinder::default()
        .bind(address)
        .await
        .expect("bind loopback endpoint")
}

async fn connect(endpoint: &RepEndpoint) -> Client {
    let addr = endpoint.local_addr().expect("endpoint address");
    let stream = TcpStream::connect(addr).await.expect("connect client");
    Framed::new(stream, LengthDelimitedCodec::new())
}

async fn recv_within(endpoint: &mut RepEndpoint) -> Bytes {
    for _ in 0..400 {
        match endpoint.try_recv() {
            Ok(frame) => return frame,
            Err(ReceiveError::WouldBlock) => sleep(Duration::from_millis(5)).await,
            Err(e) => panic!("unexpected receive error: {e}"),
        }
    }
    panic!("no frame arrived in time");
}

#[rstest]
#[tokio::test]
async fn idle_endpoint_would_block(loopback: EndpointAddress) {
    let mut endpoint = bound(&loopback).await;
    assert!(matches!(endpoint.try_recv(), Err(ReceiveError::WouldBlock)));
}

#[rstest]
#[tokio::test]
async fn replies_to_requesting_peer(loopback: EndpointAddress) {
    let mut endpoint = bound(&loopback).await;
    let mut client = connect(&endpoint).await;

    client.send(Bytes::from_static(b"ping")).await.expect("send request");
    assert_eq!(recv_within(&mut endpoint).await, Bytes::from_static(b"ping"));

    endpoint
        .send(Bytes::from_static(b"pong"))
        .await
        .expect("send reply");
    let reply = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("reply in time")
        .expect("stream open")
        .expect("valid frame");
    assert_eq!(&reply[..], b"pong");
}

#[rstest]
#[tokio::test]
async fn refuses_second_receive_until_reply(loopback: EndpointAddress) {
    let mut endpoint = bound(&loopback).await;
    let mut client = connect(&endpoint).await;
    client.send(Bytes::from_static(b"one")).await.expect("send first");
    client.send(Bytes::from_static(b"two")).await.expect("send second");

    recv_within(&mut endpoint).await;
    assert!(matches!(endpoint.try_recv(), Err(ReceiveError::ReplyPending)));

    endpoint.send(Bytes::new()).await.expect("send reply");
    assert_eq!(recv_within(&mut endpoint).await, Bytes::from_static(b"two"));
}

#[rstest]
#[tokio::test]
async fn send_without_request_is_rejected(loopback: EndpointAddress) {
    let mut endpoint = bound(&loopback).await;
    let err = endpoint
        .send(Bytes::from_static(b"stray"))
        .await
        .expect_err("send must fail");
    assert!(matches!(err, SendError::NoRequest));
}

#[rstest]
#[tokio::test]
async fn serves_peers_round_robin(loopback: EndpointAddress) {
    let mut endpoint = bound(&loopback).await;
    let mut first = connect(&endpoint).await;
    let mut second = connect(&endpoint).await;
    for _ in 0..2 {
        first.send(Bytes::from_static(b"a")).await.expect("send a");
        second.send(Bytes::from_static(b"b")).await.expect("send b");
    }
    sleep(Duration::from_millis(50)).await;

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(recv_within(&mut endpoint).await);
        endpoint.send(Bytes::new()).await.expect("reply");
    }
    let expected: Vec<&[u8]> = vec![b"a", b"b", b"a", b"b"];
    assert_eq!(seen, expected);
}

#[rstest]
#[tokio::test]
async fn close_drops_connected_peers(loopback: EndpointAddress) {
    let mut endpoint = bound(&loopback).await;
    let mut client = connect(&endpoint).await;
    client.send(Bytes::from_static(b"hi")).await.expect("send request");
    recv_within(&mut endpoint).await;
    assert_eq!(endpoint.peer_count(), 1);

    endpoint.close().await.expect("close endpoint");
    assert_eq!(endpoint.peer_count(), 0);
    let next = timeout(Duration::from_secs(2), client.next())
        .await
        .expect("close observed in time");
    assert!(next.is_none());
}

#[tokio::test]
async fn bind_conflict_is_reported() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").expect("reserve port");
    let address = EndpointAddress::from(taken.local_addr().expect("reserved address"));
    let err = TcpBinder::default()
        .bind(&address)
        .await
        .expect_err("port already in use");
    assert!(matches!(err, BindError::Io { .. }));
}

#[rstest]
#[tokio::test]
async fn stalled_reply_write_drops_the_peer(loopback: EndpointAddress) {
    let limit = Duration::from_millis(200);
    let mut endpoint = TcpBinder::default()
        .with_send_timeout(limit)
        .bind(&loopback)
        .await
        .expect("bind loopback endpoint");
    // The client never reads, so a reply larger than the socket buffers stalls.
    let mut client = connect(&endpoint).await;
    client.send(Bytes::from_static(b"req")).await.expect("send request");
    recv_within(&mut endpoint).await;

    let reply = Bytes::from(vec![0_u8; 15 * 1024 * 1024]);
    let err = timeout(Duration::from_secs(5), endpoint.send(reply))
        .await
        .expect("send gives up in time")
        .expect_err("peer never drains");
    assert!(matches!(err, SendError::TimedOut(d) if d == limit));
    assert_eq!(endpoint.peer_count(), 0);
    assert!(matches!(endpoint.try_recv(), Err(ReceiveError::WouldBlock)));
}
