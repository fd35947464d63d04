pub mod config;
pub mod error;
pub mod peer;
pub mod room;
pub mod service;
pub mod signaling;
pub mod transport;

pub use config::ClientConfig;
pub use error::RoomError;
pub use peer::{NegotiationState, Peer, PerfectPeer};
pub use room::{CloseOutcome, ConnectionState, HandlerId, RoomService};
pub use service::{RemoteStreamEvent, StreamAnnouncement, StreamsService, WebRtcService};
pub use signaling::SignalingOutput;
pub use transport::{
    ConnectionEvent, LocalStream, PeerConnection, PeerConnectionFactory, RemoteStream,
    SignalingState, WebRtcConnection, WebRtcConnectionFactory,
};
