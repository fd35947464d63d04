pub mod registry_tests;

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use screenecho_client::{ConnectionEvent, PerfectPeer, WebRtcService};
use tokio::sync::mpsc;
use tracing::Level;

use crate::utils::{LoopbackNetwork, MockConnection, MockConnectionFactory, MockSignalingOutput};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A peer on host `local` for remote `remote`, driven by hand.
pub fn create_test_peer(
    local: &str,
    remote: &str,
) -> (
    PerfectPeer,
    Arc<MockConnection>,
    mpsc::Receiver<ConnectionEvent>,
    MockSignalingOutput,
) {
    let (connection, events) = MockConnection::pair(remote);
    let signaling = MockSignalingOutput::new_stored_only(local);
    let peer = PerfectPeer::new(
        &local.into(),
        remote.into(),
        connection.clone(),
        Arc::new(signaling.clone()),
        Arc::new(AtomicBool::new(true)),
    );
    (peer, connection, events, signaling)
}

/// A detached service for `local` that records what it sends.
pub fn create_test_service(local: &str) -> (WebRtcService, MockSignalingOutput, MockConnectionFactory) {
    let signaling = MockSignalingOutput::new_stored_only(local);
    let factory = MockConnectionFactory::new();
    let service = WebRtcService::detached(Arc::new(signaling.clone()), Arc::new(factory.clone()));
    (service, signaling, factory)
}

pub struct LoopbackClient {
    pub service: WebRtcService,
    pub factory: MockConnectionFactory,
}

/// Two detached services joined through an in-memory relay.
pub fn create_loopback_pair(
    a: &str,
    b: &str,
    factory: fn() -> MockConnectionFactory,
) -> (LoopbackNetwork, LoopbackClient, LoopbackClient) {
    let network = LoopbackNetwork::new();
    let make = |id: &str| {
        let factory = factory();
        let service = WebRtcService::detached(network.signaling(id), Arc::new(factory.clone()));
        network.join(id, service.clone());
        LoopbackClient { service, factory }
    };

    let first = make(a);
    let second = make(b);
    (network, first, second)
}
