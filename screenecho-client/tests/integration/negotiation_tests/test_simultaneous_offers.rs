use screenecho_client::{SignalingState, WebRtcService};
use screenecho_core::ClientId;
use std::sync::Arc;

use crate::integration::{create_loopback_pair, init_tracing};
use crate::utils::{
    CONNECTION_TIMEOUT_MS, LoopbackNetwork, MockConnectionFactory, RecordingFactory,
    SIGNAL_TIMEOUT_MS, settle, wait_until,
};

#[tokio::test]
async fn test_simultaneous_offers_converge() {
    init_tracing();

    let (network, a, b) = create_loopback_pair("a", "b", MockConnectionFactory::new);

    // Both offers are in flight before either side sees the other's.
    network.hold();
    a.service.establish_connection_with_peer(ClientId::from("b"));
    b.service.establish_connection_with_peer(ClientId::from("a"));

    assert!(
        wait_until(SIGNAL_TIMEOUT_MS, || network.log().len() >= 2).await,
        "both sides should have offered"
    );
    network.release();

    let a_to_b = a.factory.connection("b").expect("a has a connection to b");
    let b_to_a = b.factory.connection("a").expect("b has a connection to a");

    let converged = wait_until(SIGNAL_TIMEOUT_MS, || {
        a_to_b.state().signaling == SignalingState::Stable
            && b_to_a.state().signaling == SignalingState::Stable
    })
    .await;
    assert!(converged, "both ends should reach stable");
    settle().await;

    let answers: Vec<_> = network
        .log()
        .into_iter()
        .filter(|r| r.description().is_some_and(|d| d.is_answer()))
        .collect();
    assert_eq!(answers.len(), 1, "exactly one answer");
    assert_eq!(answers[0].from.as_str(), "a", "the polite side answers");

    assert_eq!(a_to_b.state().rollbacks, 1);
    assert_eq!(b_to_a.state().rollbacks, 0);
    assert_eq!(a.service.peer_ids(), vec![ClientId::from("b")]);
    assert_eq!(b.service.peer_ids(), vec![ClientId::from("a")]);
    assert_eq!(a.factory.created(), 1);
    assert_eq!(b.factory.created(), 1);
}

#[tokio::test]
async fn test_one_sided_call_connects() {
    init_tracing();

    let (network, a, b) = create_loopback_pair("a", "b", MockConnectionFactory::with_candidates);

    b.service.establish_connection_with_peer(ClientId::from("a"));

    assert!(
        wait_until(SIGNAL_TIMEOUT_MS, || {
            a.factory.connection("b").is_some() && b.factory.connection("a").is_some()
        })
        .await
    );
    let a_to_b = a.factory.connection("b").unwrap();
    let b_to_a = b.factory.connection("a").unwrap();

    let connected = wait_until(SIGNAL_TIMEOUT_MS, || {
        let a_state = a_to_b.state();
        let b_state = b_to_a.state();
        a_state.signaling == SignalingState::Stable
            && b_state.signaling == SignalingState::Stable
            && !a_state.added_candidates.is_empty()
            && !b_state.added_candidates.is_empty()
    })
    .await;
    assert!(connected, "both ends should be stable with candidates applied");

    assert!(a.service.has_peer_connection(&ClientId::from("b")));
    assert!(!network.descriptions("b", "a").is_empty());
    assert!(!network.descriptions("a", "b").is_empty());
}

#[tokio::test]
async fn test_simultaneous_offers_converge_on_webrtc() {
    init_tracing();

    let network = LoopbackNetwork::new();
    let join = |id: &str| {
        let factory = RecordingFactory::new();
        let service = WebRtcService::detached(network.signaling(id), Arc::new(factory.clone()));
        network.join(id, service.clone());
        (service, factory)
    };
    let (a, a_factory) = join("a");
    let (b, b_factory) = join("b");

    network.hold();
    a.establish_connection_with_peer(ClientId::from("b"));
    b.establish_connection_with_peer(ClientId::from("a"));

    assert!(
        wait_until(SIGNAL_TIMEOUT_MS, || {
            !network.descriptions("a", "b").is_empty() && !network.descriptions("b", "a").is_empty()
        })
        .await,
        "both sides should have offered"
    );
    network.release();

    let a_to_b = a_factory.connection("b").expect("a has a connection to b");
    let b_to_a = b_factory.connection("a").expect("b has a connection to a");
    let stable = || {
        a_to_b.signaling_state() == SignalingState::Stable
            && b_to_a.signaling_state() == SignalingState::Stable
    };

    assert!(wait_until(CONNECTION_TIMEOUT_MS, stable).await, "both ends should reach stable");
    settle().await;
    assert!(wait_until(CONNECTION_TIMEOUT_MS, stable).await, "follow-up offers settle too");

    let first_answer = network
        .log()
        .into_iter()
        .find(|r| r.description().is_some_and(|d| d.is_answer()))
        .expect("an answer was relayed");
    assert_eq!(first_answer.from.as_str(), "a", "the polite side answers the collision");

    a.shutdown();
    b.shutdown();
}
