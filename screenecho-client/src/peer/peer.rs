use crate::transport::{ConnectionEvent, LocalStream, RemoteStream};
use async_trait::async_trait;
use screenecho_core::{ClientId, IceCandidateInit, IceCandidateMessage, SdpMessage, StreamStats};

pub type RemoteStreamCallback = Box<dyn Fn(RemoteStream) + Send + Sync>;

/// One media session with one remote client.
#[async_trait]
pub trait Peer: Send {
    fn remote_client_id(&self) -> &ClientId;

    fn is_polite(&self) -> bool;

    /// Attach the local stream for sending, or prepare to only receive when
    /// there is none. Calling it again with a stream upgrades the session.
    async fn start(&mut self, local_stream: Option<LocalStream>);

    async fn handle_sdp_message(&mut self, message: SdpMessage);

    async fn handle_ice_candidate_message(&mut self, message: IceCandidateMessage);

    async fn handle_negotiation_needed(&mut self);

    async fn handle_local_ice_candidate(&mut self, candidate: Option<IceCandidateInit>);

    async fn handle_remote_stream(&mut self, stream: RemoteStream);

    /// Replaces the callback that receives each newly seen remote stream.
    fn on_remote_stream(&mut self, callback: RemoteStreamCallback);

    async fn get_stats(&self) -> StreamStats;

    async fn close(&mut self);

    async fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::NegotiationNeeded => self.handle_negotiation_needed().await,
            ConnectionEvent::IceCandidate(candidate) => {
                self.handle_local_ice_candidate(candidate).await
            }
            ConnectionEvent::Track(stream) => self.handle_remote_stream(stream).await,
        }
    }
}
