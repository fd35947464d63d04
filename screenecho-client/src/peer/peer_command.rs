use crate::transport::LocalStream;
use screenecho_core::{IceCandidateMessage, SdpMessage, StreamStats};
use tokio::sync::oneshot;

/// Work the orchestrator hands to a peer task.
#[derive(Debug)]
pub enum PeerCommand {
    Start(Option<LocalStream>),
    RemoteSdp(SdpMessage),
    RemoteIce(IceCandidateMessage),
    GetStats(oneshot::Sender<StreamStats>),
}
