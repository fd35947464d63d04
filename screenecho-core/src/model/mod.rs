mod client;
mod messages;
mod room;
mod signaling;
mod stats;

pub use client::ClientId;
pub use messages::{
    ClientDisconnectMessage, ClientIdMessage, ErrorMessage, IceCandidateMessage, SdpMessage,
    StreamStartedMessage, StreamStoppedMessage,
};
pub use room::RoomId;
pub use signaling::{IceCandidateInit, IceServerConfig, SdpType, SessionDescription};
pub use stats::{StatsEntry, StreamStats};
