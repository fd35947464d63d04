use crate::peer::{Peer, PeerCommand};
use crate::transport::ConnectionEvent;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Drives one peer until its command channel closes, then closes it.
///
/// Commands are polled before connection events so that signaling already
/// queued for the peer is applied before it reacts to its own connection.
pub async fn run_peer<P: Peer>(
    mut peer: P,
    mut command_rx: mpsc::UnboundedReceiver<PeerCommand>,
    mut event_rx: mpsc::Receiver<ConnectionEvent>,
) {
    info!("Peer task for {} started", peer.remote_client_id());
    let mut events_open = true;

    loop {
        tokio::select! {
            biased;

            cmd = command_rx.recv() => {
                match cmd {
                    Some(c) => handle_command(&mut peer, c).await,
                    None => {
                        debug!("Command channel for {} closed", peer.remote_client_id());
                        break;
                    }
                }
            }

            evt = event_rx.recv(), if events_open => {
                match evt {
                    Some(e) => peer.handle_connection_event(e).await,
                    None => events_open = false,
                }
            }
        }
    }

    peer.close().await;
    info!("Peer task for {} finished", peer.remote_client_id());
}

async fn handle_command<P: Peer>(peer: &mut P, cmd: PeerCommand) {
    match cmd {
        PeerCommand::Start(local_stream) => peer.start(local_stream).await,
        PeerCommand::RemoteSdp(message) => peer.handle_sdp_message(message).await,
        PeerCommand::RemoteIce(message) => peer.handle_ice_candidate_message(message).await,
        PeerCommand::GetStats(reply) => {
            let _ = reply.send(peer.get_stats().await);
        }
    }
}
