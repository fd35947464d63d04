use crate::peer::{NegotiationState, Peer, RemoteStreamCallback};
use crate::signaling::SignalingOutput;
use crate::transport::{LocalStream, PeerConnection, RemoteStream, SignalingState};
use anyhow::Result;
use async_trait::async_trait;
use screenecho_core::{
    ClientId, IceCandidateInit, IceCandidateMessage, SdpMessage, SessionDescription, StreamStats,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

/// Perfect negotiation over one `PeerConnection`.
///
/// The polite side yields when both ends offer at once: it drops its own
/// offer and answers the remote one. The impolite side ignores the remote
/// offer and waits for the answer to its own.
pub struct PerfectPeer {
    remote: ClientId,
    state: NegotiationState,
    connection: Arc<dyn PeerConnection>,
    signaling: Arc<dyn SignalingOutput>,
    alive: Arc<AtomicBool>,
    sent_tracks: HashSet<String>,
    receive_only: bool,
    seen_streams: HashSet<String>,
    remote_stream_callback: Option<RemoteStreamCallback>,
}

impl PerfectPeer {
    /// `local` is the id this end was assigned; it fixes the role for the
    /// peer's lifetime. `alive` is shared with the owner; once it is cleared
    /// the peer emits nothing.
    pub fn new(
        local: &ClientId,
        remote: ClientId,
        connection: Arc<dyn PeerConnection>,
        signaling: Arc<dyn SignalingOutput>,
        alive: Arc<AtomicBool>,
    ) -> Self {
        let polite = *local < remote;
        debug!("Peer for {} created (polite: {})", remote, polite);

        Self {
            remote,
            state: NegotiationState::new(polite),
            connection,
            signaling,
            alive,
            sent_tracks: HashSet::new(),
            receive_only: false,
            seen_streams: HashSet::new(),
            remote_stream_callback: None,
        }
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        self.state
    }

    pub fn connection(&self) -> &Arc<dyn PeerConnection> {
        &self.connection
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    async fn send_local_description(&self, description: SessionDescription) {
        if !self.is_alive() {
            return;
        }
        self.signaling
            .send_sdp(self.remote.clone(), description)
            .await;
    }

    async fn apply_remote_description(&mut self, description: SessionDescription) -> Result<()> {
        let is_offer = description.is_offer();
        self.connection.set_remote_description(description).await?;

        if is_offer {
            let answer = self.connection.set_local_description().await?;
            self.send_local_description(answer).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Peer for PerfectPeer {
    fn remote_client_id(&self) -> &ClientId {
        &self.remote
    }

    fn is_polite(&self) -> bool {
        self.state.polite
    }

    async fn start(&mut self, local_stream: Option<LocalStream>) {
        match local_stream {
            Some(stream) => {
                for track in stream.tracks() {
                    if self.sent_tracks.contains(track.id()) {
                        continue;
                    }
                    match self.connection.add_track(track.clone()).await {
                        Ok(()) => {
                            debug!("Sending track {} to {}", track.id(), self.remote);
                            self.sent_tracks.insert(track.id().to_owned());
                        }
                        Err(e) => error!("Failed to add track for {}: {:?}", self.remote, e),
                    }
                }
            }
            None if !self.receive_only => match self.connection.add_receive_only_transceivers().await {
                Ok(()) => self.receive_only = true,
                Err(e) => error!(
                    "Failed to add receive-only transceivers for {}: {:?}",
                    self.remote, e
                ),
            },
            None => {}
        }
    }

    async fn handle_sdp_message(&mut self, message: SdpMessage) {
        if message.remote_client_id != self.remote {
            warn!(
                "Peer for {} got SDP addressed to {}",
                self.remote, message.remote_client_id
            );
            return;
        }
        let description = message.description;

        let ready_for_offer = !self.state.making_offer
            && (self.connection.signaling_state() == SignalingState::Stable
                || self.state.is_setting_remote_answer_pending);
        let offer_collision = description.is_offer() && !ready_for_offer;

        self.state.ignore_offer = !self.state.polite && offer_collision;
        if self.state.ignore_offer {
            info!("Ignoring colliding offer from {}", self.remote);
            return;
        }
        if offer_collision {
            info!("Offer collision with {}, yielding", self.remote);
        }

        self.state.is_setting_remote_answer_pending = description.is_answer();
        let result = self.apply_remote_description(description).await;
        self.state.is_setting_remote_answer_pending = false;

        if let Err(e) = result {
            error!("Negotiation with {} failed: {:?}", self.remote, e);
        }
    }

    async fn handle_ice_candidate_message(&mut self, message: IceCandidateMessage) {
        if message.remote_client_id != self.remote {
            return;
        }

        if let Err(e) = self.connection.add_ice_candidate(message.candidate).await
            && !self.state.ignore_offer
        {
            warn!("Failed to add ICE candidate from {}: {:?}", self.remote, e);
        }
    }

    async fn handle_negotiation_needed(&mut self) {
        debug!("Negotiation needed with {}", self.remote);
        self.state.making_offer = true;

        match self.connection.set_local_description().await {
            Ok(offer) => self.send_local_description(offer).await,
            Err(e) => error!("Failed to create offer for {}: {:?}", self.remote, e),
        }

        self.state.making_offer = false;
    }

    async fn handle_local_ice_candidate(&mut self, candidate: Option<IceCandidateInit>) {
        let Some(candidate) = candidate else {
            debug!("ICE gathering for {} finished", self.remote);
            return;
        };
        if !self.is_alive() {
            return;
        }
        self.signaling
            .send_ice_candidate(self.remote.clone(), candidate)
            .await;
    }

    async fn handle_remote_stream(&mut self, stream: RemoteStream) {
        if !self.seen_streams.insert(stream.id().to_owned()) {
            return;
        }
        info!("Remote stream {} from {}", stream.id(), self.remote);

        if !self.is_alive() {
            return;
        }
        if let Some(callback) = &self.remote_stream_callback {
            callback(stream);
        }
    }

    fn on_remote_stream(&mut self, callback: RemoteStreamCallback) {
        self.remote_stream_callback = Some(callback);
    }

    async fn get_stats(&self) -> StreamStats {
        match self.connection.get_stats().await {
            Ok(entries) => StreamStats::from_entries(&entries),
            Err(e) => {
                warn!("Failed to read stats for {}: {:?}", self.remote, e);
                StreamStats::unavailable()
            }
        }
    }

    async fn close(&mut self) {
        self.alive.store(false, Ordering::Release);
        if let Err(e) = self.connection.close().await {
            warn!("Failed to close connection to {}: {:?}", self.remote, e);
        }
        info!("Peer for {} closed", self.remote);
    }
}
