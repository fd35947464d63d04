use crate::config::ClientConfig;
use crate::transport::{
    ConnectionEvent, LocalTrack, PeerConnection, PeerConnectionFactory, RemoteStream,
    SignalingState,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use screenecho_core::{
    ClientId, IceCandidateInit, IceServerConfig, SdpType, SessionDescription, StatsEntry,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::stats::StatsReportType;

/// Everything needed to (re)build the underlying `RTCPeerConnection`.
struct ConnectionSetup {
    remote: ClientId,
    ice_servers: Vec<IceServerConfig>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    streams: Arc<Mutex<HashMap<String, RemoteStream>>>,
    generation: Arc<AtomicU64>,
}

impl ConnectionSetup {
    /// Builds a connection whose callbacks only forward events while
    /// `generation` equals `own`.
    async fn build(&self, own: u64) -> Result<Arc<RTCPeerConnection>> {
        // 1. Media engine with the default codecs
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        // 2. Default interceptors (NACK, RTCP reports)
        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        // 3. API object
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        // 4. ICE servers (STUN/TURN)
        let rtc_config = RTCConfiguration {
            ice_servers: self.ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        // 5. The peer connection itself
        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("failed to create peer connection")?,
        );

        // --- Callbacks ---

        // A. Connection state, logged only
        let remote_state = self.remote.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let remote = remote_state.clone();
                Box::pin(async move {
                    info!("Peer connection state for {} changed: {}", remote, state);
                })
            },
        ));

        // B. Negotiation needed
        let negotiation_tx = self.event_tx.clone();
        let negotiation_generation = self.generation.clone();
        peer_connection.on_negotiation_needed(Box::new(move || {
            let tx = negotiation_tx.clone();
            let current = negotiation_generation.load(Ordering::Acquire) == own;
            Box::pin(async move {
                if current {
                    let _ = tx.send(ConnectionEvent::NegotiationNeeded).await;
                }
            })
        }));

        // C. Trickle ICE
        let ice_tx = self.event_tx.clone();
        let ice_generation = self.generation.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let current = ice_generation.load(Ordering::Acquire) == own;
            Box::pin(async move {
                if !current {
                    return;
                }
                let candidate = match c {
                    Some(candidate) => match candidate.to_json() {
                        Ok(init) => Some(from_rtc_candidate(init)),
                        Err(e) => {
                            debug!("Dropping unserializable ICE candidate: {:?}", e);
                            return;
                        }
                    },
                    None => None,
                };
                let _ = tx.send(ConnectionEvent::IceCandidate(candidate)).await;
            })
        }));

        // D. Remote tracks, grouped into streams by stream id
        let streams = self.streams.clone();
        let track_tx = self.event_tx.clone();
        let track_generation = self.generation.clone();
        let remote_track = self.remote.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let tx = track_tx.clone();
            let stream = (track_generation.load(Ordering::Acquire) == own).then(|| {
                let stream_id = track.stream_id().to_string();
                debug!(
                    "Remote track {} ({}) from {} in stream {}",
                    track.id(),
                    track.kind(),
                    remote_track,
                    stream_id
                );

                let stream = {
                    let mut streams = streams.lock().unwrap_or_else(PoisonError::into_inner);
                    streams
                        .entry(stream_id.clone())
                        .or_insert_with(|| RemoteStream::new(stream_id))
                        .clone()
                };
                stream.add_track(track);
                stream
            });

            Box::pin(async move {
                if let Some(stream) = stream {
                    let _ = tx.send(ConnectionEvent::Track(stream)).await;
                }
            })
        }));

        Ok(peer_connection)
    }
}

/// Media handed to the connection so far, replayed onto a replacement.
#[derive(Default)]
struct AttachedMedia {
    tracks: Vec<LocalTrack>,
    receive_only: bool,
}

/// `PeerConnection` backed by a webrtc-rs `RTCPeerConnection`.
///
/// webrtc-rs cannot roll back a local offer. When a remote offer has to win
/// over a pending local one, the underlying connection is replaced by a
/// fresh one carrying the same media, and events from the old one are
/// dropped.
pub struct WebRtcConnection {
    setup: ConnectionSetup,
    peer_connection: RwLock<Arc<RTCPeerConnection>>,
    media: Mutex<AttachedMedia>,
}

impl WebRtcConnection {
    pub async fn new(
        remote: ClientId,
        ice_servers: &[IceServerConfig],
        event_tx: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Self> {
        let setup = ConnectionSetup {
            remote,
            ice_servers: ice_servers.to_vec(),
            event_tx,
            streams: Arc::default(),
            generation: Arc::new(AtomicU64::new(0)),
        };
        let peer_connection = setup.build(0).await?;

        Ok(Self {
            setup,
            peer_connection: RwLock::new(peer_connection),
            media: Mutex::new(AttachedMedia::default()),
        })
    }

    pub fn remote(&self) -> &ClientId {
        &self.setup.remote
    }

    fn current(&self) -> Arc<RTCPeerConnection> {
        self.peer_connection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn media(&self) -> MutexGuard<'_, AttachedMedia> {
        self.media.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops the pending local offer together with the connection it was
    /// made on.
    async fn discard_local_offer(&self) -> Result<()> {
        let previous = self.setup.generation.load(Ordering::Acquire);
        let own = previous + 1;
        let fresh = self.setup.build(own).await?;
        self.setup.generation.store(own, Ordering::Release);

        let (tracks, receive_only) = {
            let media = self.media();
            (media.tracks.clone(), media.receive_only)
        };
        if let Err(e) = attach_media(&fresh, tracks, receive_only).await {
            self.setup.generation.store(previous, Ordering::Release);
            let _ = fresh.close().await;
            return Err(e);
        }

        let stale = {
            let mut slot = self
                .peer_connection
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, fresh)
        };
        info!(
            "Dropped local offer to {} by replacing its connection",
            self.setup.remote
        );

        if let Err(e) = stale.close().await {
            debug!("Failed to close replaced connection: {:?}", e);
        }
        Ok(())
    }
}

async fn attach_media(
    peer_connection: &RTCPeerConnection,
    tracks: Vec<LocalTrack>,
    receive_only: bool,
) -> Result<()> {
    for track in tracks {
        attach_track(peer_connection, track).await?;
    }
    if receive_only {
        attach_receive_only_transceivers(peer_connection).await?;
    }
    Ok(())
}

async fn attach_track(peer_connection: &RTCPeerConnection, track: LocalTrack) -> Result<()> {
    let sender = peer_connection
        .add_track(track)
        .await
        .context("failed to add track")?;

    // RTCP has to be drained for interceptors to work.
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1500];
        while sender.read(&mut buf).await.is_ok() {}
    });
    Ok(())
}

async fn attach_receive_only_transceivers(peer_connection: &RTCPeerConnection) -> Result<()> {
    for kind in [RTPCodecType::Video, RTPCodecType::Audio] {
        peer_connection
            .add_transceiver_from_kind(
                kind,
                Some(RTCRtpTransceiverInit {
                    direction: RTCRtpTransceiverDirection::Recvonly,
                    send_encodings: vec![],
                }),
            )
            .await
            .with_context(|| format!("failed to add receive-only {kind} transceiver"))?;
    }
    Ok(())
}

#[async_trait]
impl PeerConnection for WebRtcConnection {
    fn signaling_state(&self) -> SignalingState {
        match self.current().signaling_state() {
            RTCSignalingState::HaveLocalOffer => SignalingState::HaveLocalOffer,
            RTCSignalingState::HaveRemoteOffer => SignalingState::HaveRemoteOffer,
            RTCSignalingState::HaveLocalPranswer => SignalingState::HaveLocalPranswer,
            RTCSignalingState::HaveRemotePranswer => SignalingState::HaveRemotePranswer,
            RTCSignalingState::Closed => SignalingState::Closed,
            _ => SignalingState::Stable,
        }
    }

    async fn set_local_description(&self) -> Result<SessionDescription> {
        let peer_connection = self.current();
        let description = match self.signaling_state() {
            SignalingState::HaveRemoteOffer | SignalingState::HaveLocalPranswer => peer_connection
                .create_answer(None)
                .await
                .context("failed to create answer")?,
            _ => peer_connection
                .create_offer(None)
                .await
                .context("failed to create offer")?,
        };

        peer_connection
            .set_local_description(description)
            .await
            .context("failed to set local description")?;

        let applied = peer_connection
            .local_description()
            .await
            .context("local description missing after it was set")?;
        from_rtc_description(applied)
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        if description.is_offer() && self.signaling_state() == SignalingState::HaveLocalOffer {
            self.discard_local_offer().await?;
        }

        let remote = match description.sdp_type {
            SdpType::Offer => RTCSessionDescription::offer(description.sdp)?,
            SdpType::Answer => RTCSessionDescription::answer(description.sdp)?,
            SdpType::Pranswer => RTCSessionDescription::pranswer(description.sdp)?,
            SdpType::Rollback => serde_json::from_value(serde_json::to_value(&description)?)?,
        };

        self.current()
            .set_remote_description(remote)
            .await
            .context("failed to set remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidateInit) -> Result<()> {
        self.current()
            .add_ice_candidate(to_rtc_candidate(candidate))
            .await
            .context("failed to add ICE candidate")?;
        Ok(())
    }

    async fn add_track(&self, track: LocalTrack) -> Result<()> {
        attach_track(&self.current(), track.clone()).await?;
        self.media().tracks.push(track);
        Ok(())
    }

    async fn add_receive_only_transceivers(&self) -> Result<()> {
        attach_receive_only_transceivers(&self.current()).await?;
        self.media().receive_only = true;
        Ok(())
    }

    /// webrtc-rs reports no frame size, frame rate or jitter for inbound
    /// RTP, so those fields stay empty.
    async fn get_stats(&self) -> Result<Vec<StatsEntry>> {
        let report = self.current().get_stats().await;
        let entries = report
            .reports
            .values()
            .map(|stat| match stat {
                StatsReportType::Codec(codec) => StatsEntry::Codec {
                    mime_type: codec.mime_type.clone(),
                },
                StatsReportType::InboundRTP(inbound) => StatsEntry::InboundRtp {
                    kind: inbound.kind.to_string(),
                    frame_width: None,
                    frame_height: None,
                    frames_per_second: None,
                    jitter: None,
                },
                _ => StatsEntry::Other,
            })
            .collect();
        Ok(entries)
    }

    async fn close(&self) -> Result<()> {
        self.current().close().await?;
        Ok(())
    }
}

/// Creates a `WebRtcConnection` per remote client with the configured ICE servers.
#[derive(Clone)]
pub struct WebRtcConnectionFactory {
    ice_servers: Vec<IceServerConfig>,
}

impl WebRtcConnectionFactory {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
        }
    }
}

#[async_trait]
impl PeerConnectionFactory for WebRtcConnectionFactory {
    async fn create(
        &self,
        remote: &ClientId,
        events: mpsc::Sender<ConnectionEvent>,
    ) -> Result<Arc<dyn PeerConnection>> {
        let connection = WebRtcConnection::new(remote.clone(), &self.ice_servers, events).await?;
        Ok(Arc::new(connection))
    }
}

fn to_rtc_ice_server(server: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn from_rtc_description(description: RTCSessionDescription) -> Result<SessionDescription> {
    let sdp_type = match description.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        other => anyhow::bail!("unsupported local description type {other}"),
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: description.sdp,
    })
}

fn to_rtc_candidate(candidate: IceCandidateInit) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_m_line_index,
        username_fragment: candidate.username_fragment,
    }
}

fn from_rtc_candidate(candidate: RTCIceCandidateInit) -> IceCandidateInit {
    IceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_m_line_index: candidate.sdp_mline_index,
        username_fragment: candidate.username_fragment,
    }
}
