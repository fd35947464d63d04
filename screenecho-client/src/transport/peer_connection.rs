use crate::transport::{ConnectionEvent, LocalTrack};
use anyhow::Result;
use async_trait::async_trait;
use screenecho_core::{ClientId, IceCandidateInit, SessionDescription, StatsEntry};
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

/// The operations the negotiation state machine drives on a platform peer
/// connection.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    fn signaling_state(&self) -> SignalingState;

    /// Creates and applies an offer, or an answer when a remote offer is
    /// pending, and returns the applied description.
    async fn set_local_description(&self) -> Result<SessionDescription>;

    /// Applies a remote description. An offer arriving while a local offer
    /// is pending discards the local one first.
    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidateInit) -> Result<()>;

    async fn add_track(&self, track: LocalTrack) -> Result<()>;

    /// Adds one receive-only video and one receive-only audio transceiver.
    async fn add_receive_only_transceivers(&self) -> Result<()>;

    async fn get_stats(&self) -> Result<Vec<StatsEntry>>;

    async fn close(&self) -> Result<()>;
}

/// Creates one connection per remote client. Connection events for that
/// client go to `events`.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn create(
        &self,
        remote: &ClientId,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Arc<dyn PeerConnection>>;
}
