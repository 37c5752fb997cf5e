//! Lifecycle tests for [`RepServer`] and [`ServerHandle`].

use std::time::Duration;

use bytes::Bytes;
use rstest::{fixture, rstest};
use tokio::time::{sleep, timeout};

use super::{RepServer, ServerConfig, WorkerState};
use crate::{
    codec::{BincodeCodec, Request},
    error::{BindError, HandlerError},
    test_helpers::{Probe, ScriptedBinder, Step},
};

const TICK: Duration = Duration::from_millis(500);

fn pong(_: Request) -> Result<Bytes, HandlerError> { Ok(Bytes::from_static(b"pong")) }

type PongServer = RepServer<BincodeCodec<Request>, fn(Request) -> Result<Bytes, HandlerError>>;

#[fixture]
fn server() -> PongServer {
    RepServer::new(BincodeCodec::new(), pong as fn(Request) -> Result<Bytes, HandlerError>)
        .address("tcp://127.0.0.1:5555".parse().expect("address"))
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn immediate_shutdown_finishes_within_one_tick(server: PongServer) {
    let probe = Probe::new();
    let handle = server
        .bind_with(ScriptedBinder::new(probe.clone()))
        .await
        .expect("bind")
        .start();
    let state = handle.subscribe();

    timeout(TICK, handle.shutdown())
        .await
        .expect("shutdown within one tick");
    assert_eq!(probe.closes(), 1);
    assert!(probe.sent().is_empty());
    assert_eq!(*state.borrow(), WorkerState::Terminated);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn no_receives_after_shutdown_returns(server: PongServer) {
    let probe = Probe::new();
    let handle = server
        .poll_interval(Duration::from_millis(100))
        .bind_with(ScriptedBinder::new(probe.clone()))
        .await
        .expect("bind")
        .start();

    sleep(Duration::from_millis(350)).await;
    handle.shutdown().await;
    let attempts = probe.receive_attempts();
    assert!(attempts >= 3, "expected polling before shutdown, saw {attempts}");

    sleep(Duration::from_secs(2)).await;
    assert_eq!(probe.receive_attempts(), attempts);
    assert_eq!(probe.closes(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn serves_requests_until_shutdown(server: PongServer) {
    let probe = Probe::new();
    probe.push([
        Step::Idle,
        Step::Frame(Request::new("svc", "ping").to_frame().expect("encode")),
    ]);
    let handle = server
        .bind_with(ScriptedBinder::new(probe.clone()))
        .await
        .expect("bind")
        .start();

    sleep(TICK * 3).await;
    assert_eq!(handle.state(), WorkerState::Listening);
    handle.shutdown().await;

    assert_eq!(probe.sent(), [Bytes::from_static(b"pong")]);
    assert_eq!(probe.remaining(), 0);
}

#[rstest]
#[tokio::test]
async fn bind_failure_is_fatal_to_startup(server: PongServer) {
    let probe = Probe::new();
    probe.fail_next_binds(1);
    let result = server.bind_with(ScriptedBinder::new(probe.clone())).await;
    assert!(matches!(result, Err(BindError::Io { .. })));
    assert_eq!(probe.binds(), 0);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn dropping_handle_stops_worker(server: PongServer) {
    let probe = Probe::new();
    let handle = server
        .bind_with(ScriptedBinder::new(probe.clone()))
        .await
        .expect("bind")
        .start();
    let mut state = handle.subscribe();

    drop(handle);
    timeout(TICK, state.wait_for(|s| *s == WorkerState::Terminated))
        .await
        .expect("worker stops in time")
        .expect("state channel open");
    assert_eq!(probe.closes(), 1);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn run_until_returns_after_future_resolves(server: PongServer) {
    let probe = Probe::new();
    let bound = server
        .bind_with(ScriptedBinder::new(probe.clone()))
        .await
        .expect("bind");
    bound.run_until(sleep(TICK * 2)).await;
    assert_eq!(probe.closes(), 1);
}

#[test]
fn config_setters_are_normalized() {
    let server = RepServer::new(BincodeCodec::<Request>::new(), pong)
        .with_config(ServerConfig {
            error_threshold: 7,
            ..ServerConfig::default()
        })
        .poll_interval(Duration::ZERO)
        .handler_timeout(Duration::from_secs(2))
        .send_timeout(Duration::ZERO);
    let config = server.config();
    assert_eq!(config.poll_interval, Duration::from_millis(1));
    assert_eq!(config.error_threshold, 7);
    assert_eq!(config.handler_timeout, Some(Duration::from_secs(2)));
    assert_eq!(config.send_timeout, Duration::from_millis(1));
}

#[tokio::test]
async fn answers_over_tcp() {
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio_util::codec::{Framed, LengthDelimitedCodec};

    let bound = RepServer::new(BincodeCodec::<Request>::new(), pong)
        .address("tcp://127.0.0.1:0".parse().expect("address"))
        .poll_interval(Duration::from_millis(10))
        .bind()
        .await
        .expect("bind loopback");
    let addr = bound.local_addr().expect("bound address");
    let handle = bound.start();
    assert_eq!(handle.local_addr(), Some(addr));

    let stream = TcpStream::connect(addr).await.expect("connect");
    let mut client = Framed::new(stream, LengthDelimitedCodec::new());
    client
        .send(Request::new("svc", "ping").to_frame().expect("encode"))
        .await
        .expect("send request");
    let reply = timeout(Duration::from_secs(5), client.next())
        .await
        .expect("reply in time")
        .expect("connection open")
        .expect("valid frame");
    assert_eq!(&reply[..], b"pong");

    handle.shutdown().await;
}
