use screenecho_client::Peer;
use screenecho_core::{ClientId, IceCandidateInit, IceCandidateMessage, SdpMessage, SessionDescription};

use crate::integration::{create_test_peer, init_tracing};

fn candidate_from(from: &str, n: u16) -> IceCandidateMessage {
    IceCandidateMessage {
        remote_client_id: ClientId::from(from),
        candidate: IceCandidateInit::new(format!(
            "candidate:{n} 1 udp 2122260223 10.0.0.{n} 5000{n} typ host"
        )),
    }
}

#[tokio::test]
async fn test_candidates_for_ignored_offer_fail_quietly() {
    init_tracing();

    let (mut peer, connection, _events, _signaling) = create_test_peer("b", "a");

    peer.handle_negotiation_needed().await;
    peer.handle_sdp_message(SdpMessage {
        remote_client_id: ClientId::from("a"),
        description: SessionDescription::offer("colliding offer"),
    })
    .await;
    assert!(peer.negotiation_state().ignore_offer);

    peer.handle_ice_candidate_message(candidate_from("a", 1)).await;
    assert_eq!(connection.state().rejected_candidates, 1);
    assert!(connection.state().added_candidates.is_empty());

    peer.handle_sdp_message(SdpMessage {
        remote_client_id: ClientId::from("a"),
        description: SessionDescription::answer("answer"),
    })
    .await;
    peer.handle_ice_candidate_message(candidate_from("a", 2)).await;

    assert_eq!(connection.state().added_candidates.len(), 1);
}

#[tokio::test]
async fn test_candidate_for_other_peer_is_ignored() {
    init_tracing();

    let (mut peer, connection, _events, _signaling) = create_test_peer("b", "a");

    peer.handle_ice_candidate_message(candidate_from("c", 1)).await;

    let state = connection.state();
    assert_eq!(state.rejected_candidates, 0);
    assert!(state.added_candidates.is_empty());
}

#[tokio::test]
async fn test_local_candidates_are_forwarded() {
    init_tracing();

    let (mut peer, _connection, _events, signaling) = create_test_peer("a", "b");
    let candidate = IceCandidateInit::new("candidate:7 1 udp 1 192.168.1.7 40000 typ host");

    peer.handle_local_ice_candidate(Some(candidate.clone())).await;
    peer.handle_local_ice_candidate(None).await;

    assert_eq!(
        signaling.ice_candidates_for(&ClientId::from("b")).await,
        vec![candidate]
    );
}
