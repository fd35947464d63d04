use crate::transport::RemoteStream;
use screenecho_core::IceCandidateInit;

/// Events a peer connection raises for the peer task that owns it.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The connection wants a new offer/answer round.
    NegotiationNeeded,

    /// A local ICE candidate was gathered. `None` marks the end of gathering.
    IceCandidate(Option<IceCandidateInit>),

    /// A remote track arrived; carries the stream it belongs to.
    Track(RemoteStream),
}
