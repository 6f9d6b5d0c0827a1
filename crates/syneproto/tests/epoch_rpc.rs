//! Epoch RPC over real TCP sockets: publisher on a ROUTER, clients on DEALERs.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use syneproto::socket_config::{
    create_router_and_bind, frames_to_multipart, multipart_to_frames, SplitSocket, ZmqContext,
};
use syneproto::{
    ClientConfig, ClockPublisher, Command, ConnectionState, ContentType, Epoch, EpochClient,
    EpochReply, EpochSource, EpochStore, FetchError, FrameError, LazyPirateConfig, ProtocolError,
    PublisherError, SyneFrame, TransportError, EPOCH_SERVICE,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use uuid::Uuid;

static PORT: AtomicU16 = AtomicU16::new(17870);

fn next_port() -> u16 {
    PORT.fetch_add(1, Ordering::SeqCst)
}

fn bind_endpoint(port: u16) -> String {
    format!("tcp://127.0.0.1:{}", port)
}

fn publish(port: u16, nanos: u64) -> syneproto::PublisherHandle {
    let store = Arc::new(EpochStore::new(Epoch::from_nanos(nanos), 20000));
    ClockPublisher::bind(&bind_endpoint(port), store)
        .expect("bind publisher")
        .spawn()
}

fn client(port: u16) -> EpochClient {
    let pirate = LazyPirateConfig::default()
        .with_timeout(Duration::from_millis(500))
        .with_retries(2)
        .with_backoff(Duration::from_millis(20), Duration::from_millis(50));
    EpochClient::new(ClientConfig::new("test-slave", &bind_endpoint(port)).with_pirate(pirate))
}

#[tokio::test]
async fn fetch_returns_published_epoch() {
    let port = next_port();
    let publisher = publish(port, 1000);
    let client = client(port);

    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    let epoch = client.fetch_epoch().await.expect("fetch");
    assert_eq!(epoch, Epoch::from_nanos(1000));
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    // No caching: a second fetch is a second round trip
    client.fetch_epoch().await.expect("second fetch");
    assert!(publisher.served() >= 2);

    publisher.shutdown().await;
}

#[tokio::test]
async fn unreachable_master_fails_within_bound() {
    let port = next_port();
    let pirate = LazyPirateConfig::default()
        .with_timeout(Duration::from_millis(150))
        .with_retries(1)
        .with_backoff(Duration::from_millis(10), Duration::from_millis(10));
    let bound = pirate.worst_case();
    let client = EpochClient::new(ClientConfig::new("lonely", &bind_endpoint(port)).with_pirate(pirate));

    let start = Instant::now();
    let err = client.fetch_epoch().await.unwrap_err();
    let elapsed = start.elapsed();

    assert!(
        matches!(err, FetchError::Transport(TransportError::Timeout(_))),
        "unexpected error: {err}"
    );
    assert!(elapsed >= Duration::from_millis(150));
    assert!(elapsed < bound + Duration::from_millis(500), "took {elapsed:?}");
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(client.health().get_failures(), 2);
}

#[tokio::test]
async fn client_created_before_master_starts() {
    let port = next_port();
    let client = client(port);

    assert!(client.fetch_epoch().await.is_err());

    let publisher = publish(port, 4242);
    let epoch = client.fetch_epoch().await.expect("fetch after master came up");
    assert_eq!(epoch, Epoch::from_nanos(4242));

    publisher.shutdown().await;
}

#[tokio::test]
async fn master_restart_is_seen_as_new_epoch() {
    let port = next_port();
    let client = client(port);

    let first = publish(port, 1000);
    assert_eq!(client.fetch_epoch().await.unwrap(), Epoch::from_nanos(1000));
    first.shutdown().await;

    let second = publish(port, 2000);
    assert_eq!(client.fetch_epoch().await.unwrap(), Epoch::from_nanos(2000));
    second.shutdown().await;
}

#[tokio::test]
async fn second_bind_on_same_port_fails() {
    let port = next_port();
    let publisher = publish(port, 1);

    let store = Arc::new(EpochStore::new(Epoch::from_nanos(2), 20000));
    let err = ClockPublisher::bind(&bind_endpoint(port), store)
        .err()
        .expect("second bind must fail");
    let PublisherError::Bind { endpoint, .. } = err;
    assert_eq!(endpoint, bind_endpoint(port));

    publisher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_slaves_all_get_the_epoch() {
    let port = next_port();
    let publisher = publish(port, 777);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = client(port);
            tokio::spawn(async move { client.fetch_epoch().await })
        })
        .collect();

    for task in tasks {
        let epoch = task.await.expect("join").expect("fetch");
        assert_eq!(epoch, Epoch::from_nanos(777));
    }
    assert!(publisher.served() >= 8);

    publisher.shutdown().await;
}

#[tokio::test]
async fn status_query_reports_master() {
    let port = next_port();
    let store = Arc::new(EpochStore::new(Epoch::from_nanos(99), 20123));
    let publisher = ClockPublisher::bind(&bind_endpoint(port), store)
        .expect("bind")
        .spawn();

    let status = client(port).fetch_status().await.expect("status");
    assert_eq!(status.epoch, Epoch::from_nanos(99));
    assert_eq!(status.clock_port, 20123);

    publisher.shutdown().await;
}

#[tokio::test]
async fn invalid_endpoint_is_a_transport_error() {
    let client = EpochClient::new(
        ClientConfig::new("bad", "bogus://nowhere").with_retries(0),
    );
    let err = client.fetch_epoch().await.unwrap_err();
    assert!(matches!(
        err,
        FetchError::Transport(TransportError::Socket(_))
    ));
}

/// A hand-driven ROUTER that answers exactly one request with whatever
/// `answer` builds for its request id, then holds the socket open until told
/// to close so the reply is not discarded by LINGER 0.
fn answer_once<F>(port: u16, answer: F) -> (oneshot::Sender<()>, JoinHandle<()>)
where
    F: FnOnce(Uuid) -> SyneFrame + Send + 'static,
{
    let context = ZmqContext::new();
    let socket = create_router_and_bind(&context, &bind_endpoint(port), "hand-router")
        .expect("bind hand router");
    let (close_tx, close_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let SplitSocket { mut tx, mut rx } = socket;
        let mp = rx.next().await.expect("request").expect("recv");
        let (identity, request) =
            SyneFrame::from_frames_with_identity(&multipart_to_frames(mp)).expect("parse request");

        let reply = answer(request.request_id);
        tx.send(frames_to_multipart(&reply.to_frames_with_identity(&identity)))
            .await
            .expect("send reply");

        let _ = close_rx.await;
        drop(tx);
        drop(rx);
        drop(context);
    });

    (close_tx, task)
}

fn single_shot_client(port: u16) -> EpochClient {
    EpochClient::new(
        ClientConfig::new("test-slave", &bind_endpoint(port))
            .with_timeout(Duration::from_millis(500))
            .with_retries(0),
    )
}

#[tokio::test]
async fn undecodable_reply_is_protocol_error_and_socket_recovers() {
    let port = next_port();
    let (close, router) = answer_once(port, |request_id| SyneFrame {
        command: Command::Reply,
        content_type: ContentType::MsgPack,
        request_id,
        service: String::new(),
        body: Bytes::from_static(&[0xc1]),
    });
    let client = single_shot_client(port);

    let err = client.fetch_epoch().await.unwrap_err();
    assert!(
        matches!(
            err,
            FetchError::Protocol(ProtocolError::Frame(FrameError::MsgPackDecode(_)))
        ),
        "unexpected error: {err}"
    );
    assert!(!err.is_timeout());
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);

    let _ = close.send(());
    router.await.expect("hand router");

    // A real master on the same port: the client opens a fresh socket
    let publisher = publish(port, 3000);
    assert_eq!(client.fetch_epoch().await.expect("fetch"), Epoch::from_nanos(3000));
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    publisher.shutdown().await;
}

#[tokio::test]
async fn master_error_reply_surfaces_as_remote() {
    let port = next_port();
    let (close, router) = answer_once(port, |request_id| {
        SyneFrame::reply(
            request_id,
            &EpochReply::Error {
                message: "bad request: nope".into(),
            },
        )
        .expect("encode")
    });

    let err = single_shot_client(port).fetch_epoch().await.unwrap_err();
    match err {
        FetchError::Protocol(ProtocolError::Remote(message)) => {
            assert_eq!(message, "bad request: nope")
        }
        other => panic!("expected remote error, got {other}"),
    }

    let _ = close.send(());
    router.await.expect("hand router");
}

#[tokio::test]
async fn wrong_reply_variant_is_unexpected() {
    let port = next_port();
    let (close, router) = answer_once(port, |request_id| {
        let status = EpochStore::new(Epoch::from_nanos(1), 20000).status();
        SyneFrame::reply(request_id, &EpochReply::Status(status)).expect("encode")
    });

    let err = single_shot_client(port).fetch_epoch().await.unwrap_err();
    assert!(
        matches!(err, FetchError::Protocol(ProtocolError::UnexpectedReply(_))),
        "unexpected error: {err}"
    );

    let _ = close.send(());
    router.await.expect("hand router");
}

#[tokio::test]
async fn reply_with_wrong_command_is_rejected() {
    let port = next_port();
    let (close, router) = answer_once(port, |request_id| {
        let mut frame = SyneFrame::heartbeat(EPOCH_SERVICE);
        frame.request_id = request_id;
        frame
    });

    let err = single_shot_client(port).fetch_epoch().await.unwrap_err();
    assert!(
        matches!(
            err,
            FetchError::Protocol(ProtocolError::UnexpectedCommand(Command::Heartbeat))
        ),
        "unexpected error: {err}"
    );

    let _ = close.send(());
    router.await.expect("hand router");
}
