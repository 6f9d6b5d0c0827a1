//! Master and slave talking over real TCP sockets.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use syneplayer::{
    FixedClock, HeadlessFactory, MasterConfig, MasterError, MasterServer, SlaveConfig, SlaveNode,
    SyncState, SystemClock,
};
use syneproto::{ClockPublisher, Epoch, EpochStore, LazyPirateConfig};
use tokio::sync::watch;

static PORT: AtomicU16 = AtomicU16::new(17970);

fn next_port() -> u16 {
    PORT.fetch_add(1, Ordering::SeqCst)
}

fn master_config(port: u16) -> MasterConfig {
    MasterConfig {
        rpc_endpoint: format!("tcp://127.0.0.1:{}", port),
        clock_port: 20000,
        media: None,
    }
}

fn slave_config(port: u16) -> SlaveConfig {
    SlaveConfig {
        master_endpoint: format!("tcp://127.0.0.1:{}", port),
        master_host: "127.0.0.1".into(),
        clock_port: 20000,
        media: None,
        poll_interval: Duration::from_millis(100),
        pirate: LazyPirateConfig::default()
            .with_timeout(Duration::from_millis(200))
            .with_retries(0),
    }
}

fn start_master(port: u16, epoch: u64) -> MasterServer<syneplayer::HeadlessEngine> {
    let clock = FixedClock(Epoch::from_nanos(epoch));
    let factory = HeadlessFactory::new(Arc::new(clock));
    MasterServer::start(master_config(port), factory, &clock).expect("master start")
}

async fn wait_for(rx: &mut watch::Receiver<SyncState>, want: SyncState) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|state| *state == want))
        .await
        .unwrap_or_else(|_| panic!("never reached {want:?}"))
        .expect("state channel closed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slave_follows_master_through_restart() {
    let port = next_port();
    let slave = SlaveNode::start(
        slave_config(port),
        HeadlessFactory::new(Arc::new(SystemClock)),
    );
    let mut state = slave.subscribe();

    // Nobody is serving yet
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(slave.state(), SyncState::AwaitingMaster);

    let master = start_master(port, 1000);
    assert_eq!(master.epoch(), Epoch::from_nanos(1000));
    assert_eq!(master.session().engine().surface_id(), 1);
    wait_for(&mut state, SyncState::Synced(Epoch::from_nanos(1000))).await;
    assert!(master.served() >= 1);

    let surface = master.shutdown().await;
    assert!(surface.is_some());

    let master = start_master(port, 2000);
    wait_for(&mut state, SyncState::Synced(Epoch::from_nanos(2000))).await;

    let report = slave.shutdown().await.expect("poll loop");
    assert_eq!(report.engines_started, 2);
    assert_eq!(report.engines_stopped, 2);
    assert_eq!(report.start_failures, 0);

    master.shutdown().await;
}

#[tokio::test]
async fn two_masters_cannot_share_a_port() {
    let port = next_port();
    let first = start_master(port, 1);

    let clock = FixedClock(Epoch::from_nanos(2));
    let result = MasterServer::start(
        master_config(port),
        HeadlessFactory::new(Arc::new(clock)),
        &clock,
    );
    assert!(matches!(result, Err(MasterError::Publisher(_))));

    first.shutdown().await;
}

#[tokio::test]
async fn failed_local_playback_releases_the_port() {
    let port = next_port();
    let clock = FixedClock(Epoch::from_nanos(5));
    let mut config = master_config(port);
    config.media = Some(PathBuf::from("/nonexistent/syneplayer/loop.ogg"));

    let result = MasterServer::start(config, HeadlessFactory::new(Arc::new(clock)), &clock);
    assert!(matches!(result, Err(MasterError::Engine(_))));

    let store = Arc::new(EpochStore::new(Epoch::from_nanos(6), 20000));
    let rebound = ClockPublisher::bind(&format!("tcp://127.0.0.1:{}", port), store);
    assert!(rebound.is_ok(), "port still held after failed start");
}

#[tokio::test]
async fn cancel_token_stops_slave() {
    let port = next_port();
    let slave = SlaveNode::start(
        slave_config(port),
        HeadlessFactory::new(Arc::new(SystemClock)),
    );
    assert_eq!(slave.master_endpoint(), format!("tcp://127.0.0.1:{}", port));

    slave.cancel_token().cancel();
    let report = tokio::time::timeout(Duration::from_secs(2), slave.shutdown())
        .await
        .expect("shutdown after cancel")
        .expect("poll loop");
    assert_eq!(report.engines_started, 0);
}
