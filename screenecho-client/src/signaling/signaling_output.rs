use async_trait::async_trait;
use screenecho_core::{ClientId, IceCandidateInit, SessionDescription};

/// Outbound side of the room as seen by a peer: emit signaling envelopes to
/// one remote client and read the local id.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Send an `sdp-message` addressed to `remote`.
    async fn send_sdp(&self, remote: ClientId, description: SessionDescription);

    /// Send a `new-ice-candidate` addressed to `remote`.
    async fn send_ice_candidate(&self, remote: ClientId, candidate: IceCandidateInit);

    fn local_client_id(&self) -> ClientId;
}
