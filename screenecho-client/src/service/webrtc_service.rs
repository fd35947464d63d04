use crate::peer::{Peer, PeerCommand, PerfectPeer, run_peer};
use crate::room::{HandlerId, RoomService};
use crate::signaling::SignalingOutput;
use crate::transport::{LocalStream, PeerConnectionFactory, RemoteStream, WebRtcConnectionFactory};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use screenecho_core::{
    ClientDisconnectMessage, ClientId, IceCandidateMessage, MessageType, Observable, ObserverId,
    SdpMessage, StreamStats,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

const CONNECTION_EVENT_BUFFER: usize = 256;

/// A remote stream seen for the first time, tagged with the client it came from.
#[derive(Debug, Clone)]
pub struct RemoteStreamEvent {
    pub client_id: ClientId,
    pub stream: RemoteStream,
}

struct PeerHandle {
    commands: mpsc::UnboundedSender<PeerCommand>,
    alive: Arc<AtomicBool>,
}

impl PeerHandle {
    fn send(&self, cmd: PeerCommand) {
        if self.commands.send(cmd).is_err() {
            debug!("Peer task already finished, dropping command");
        }
    }
}

struct ServiceInner {
    signaling: Arc<dyn SignalingOutput>,
    factory: Arc<dyn PeerConnectionFactory>,
    peers: DashMap<ClientId, PeerHandle>,
    local_stream: Mutex<Option<LocalStream>>,
    remote_streams: Observable<RemoteStreamEvent>,
    room: Option<RoomService>,
    subscriptions: Mutex<Vec<(MessageType, HandlerId)>>,
}

/// Keeps one negotiating peer per remote client and routes signaling to it.
///
/// Bus handlers only enqueue work on the matching peer task, so a slow
/// negotiation never holds up dispatch.
#[derive(Clone)]
pub struct WebRtcService {
    inner: Arc<ServiceInner>,
}

impl WebRtcService {
    /// Subscribes to `sdp-message`, `new-ice-candidate` and
    /// `client-disconnect` on `room` and connects peers with webrtc-rs.
    pub fn new(room: &RoomService) -> Self {
        let factory = Arc::new(WebRtcConnectionFactory::new(room.config()));
        Self::with_factory(room, factory)
    }

    pub fn with_factory(room: &RoomService, factory: Arc<dyn PeerConnectionFactory>) -> Self {
        let service = Self::build(Arc::new(room.clone()), factory, Some(room.clone()));

        let weak = Arc::downgrade(&service.inner);
        let sdp = room.subscribe(move |msg: SdpMessage| {
            if let Some(service) = upgrade(&weak) {
                service.handle_sdp_message(msg);
            }
            async { Ok(()) }
        });

        let weak = Arc::downgrade(&service.inner);
        let ice = room.subscribe(move |msg: IceCandidateMessage| {
            if let Some(service) = upgrade(&weak) {
                service.handle_ice_candidate_message(msg);
            }
            async { Ok(()) }
        });

        let weak = Arc::downgrade(&service.inner);
        let disconnect = room.subscribe(move |msg: ClientDisconnectMessage| {
            if let Some(service) = upgrade(&weak) {
                service.handle_client_disconnect(msg);
            }
            async { Ok(()) }
        });

        *service.subscriptions() = vec![
            (MessageType::Sdp, sdp),
            (MessageType::IceCandidate, ice),
            (MessageType::ClientDisconnect, disconnect),
        ];
        service
    }

    /// A service that is not attached to a bus. Inbound signaling is fed
    /// through the `handle_*` methods.
    pub fn detached(
        signaling: Arc<dyn SignalingOutput>,
        factory: Arc<dyn PeerConnectionFactory>,
    ) -> Self {
        Self::build(signaling, factory, None)
    }

    fn build(
        signaling: Arc<dyn SignalingOutput>,
        factory: Arc<dyn PeerConnectionFactory>,
        room: Option<RoomService>,
    ) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                signaling,
                factory,
                peers: DashMap::new(),
                local_stream: Mutex::new(None),
                remote_streams: Observable::new(),
                room,
                subscriptions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Calls the remote client.
    ///
    /// # Panics
    ///
    /// Panics if a peer for `client_id` already exists, or if the signaling
    /// side has no local client id yet.
    pub fn establish_connection_with_peer(&self, client_id: ClientId) {
        let local = self.inner.signaling.local_client_id();
        match self.inner.peers.entry(client_id.clone()) {
            Entry::Occupied(_) => panic!("connection to peer {client_id} already exists"),
            Entry::Vacant(entry) => {
                info!("Calling {}", client_id);
                entry.insert(self.spawn_peer(local, client_id));
            }
        }
    }

    /// Routes an inbound `sdp-message`; a remote offer from an unknown client
    /// creates its peer.
    ///
    /// # Panics
    ///
    /// Panics if a peer has to be created before the local client id is known.
    pub fn handle_sdp_message(&self, msg: SdpMessage) {
        let remote = msg.remote_client_id.clone();
        let entry = self.inner.peers.entry(remote.clone()).or_insert_with(|| {
            let local = self.inner.signaling.local_client_id();
            info!("{} is calling us", remote);
            self.spawn_peer(local, remote.clone())
        });
        entry.send(PeerCommand::RemoteSdp(msg));
    }

    /// Routes an inbound `new-ice-candidate`; candidates for unknown peers are dropped.
    pub fn handle_ice_candidate_message(&self, msg: IceCandidateMessage) {
        match self.inner.peers.get(&msg.remote_client_id) {
            Some(peer) => peer.send(PeerCommand::RemoteIce(msg)),
            None => debug!(
                "Dropping ICE candidate from unknown peer {}",
                msg.remote_client_id
            ),
        }
    }

    pub fn handle_client_disconnect(&self, msg: ClientDisconnectMessage) {
        if self.close_peer(&msg.client_id) {
            info!("{} left the room", msg.client_id);
        }
    }

    /// Stores the stream for future peers and (re)starts every current peer with it.
    pub fn set_local_stream(&self, stream: LocalStream) {
        *self.local_stream_slot() = Some(stream.clone());
        for peer in self.inner.peers.iter() {
            peer.send(PeerCommand::Start(Some(stream.clone())));
        }
    }

    pub fn local_stream(&self) -> Option<LocalStream> {
        self.local_stream_slot().clone()
    }

    /// True from creation until removal, including while negotiating.
    pub fn has_peer_connection(&self, client_id: &ClientId) -> bool {
        self.inner.peers.contains_key(client_id)
    }

    pub fn peer_ids(&self) -> Vec<ClientId> {
        self.inner.peers.iter().map(|peer| peer.key().clone()).collect()
    }

    /// Removes the peer and closes its connection. Returns false if there was none.
    pub fn close_peer(&self, client_id: &ClientId) -> bool {
        match self.inner.peers.remove(client_id) {
            Some((_, handle)) => {
                handle.alive.store(false, Ordering::Release);
                info!("Closing peer {}", client_id);
                true
            }
            None => false,
        }
    }

    /// `None` if there is no peer for `client_id`.
    pub async fn get_stats(&self, client_id: &ClientId) -> Option<StreamStats> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner
            .peers
            .get(client_id)?
            .send(PeerCommand::GetStats(reply_tx));
        reply_rx.await.ok()
    }

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&RemoteStreamEvent) + Send + Sync + 'static,
    {
        self.inner.remote_streams.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        self.inner.remote_streams.unsubscribe(id);
    }

    /// Detaches from the bus and closes every peer.
    pub fn shutdown(&self) {
        if let Some(room) = &self.inner.room {
            for (kind, id) in self.subscriptions().drain(..) {
                room.unsubscribe(kind, id);
            }
        }
        for client_id in self.peer_ids() {
            self.close_peer(&client_id);
        }
    }

    fn spawn_peer(&self, local: ClientId, remote: ClientId) -> PeerHandle {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));

        let handle = PeerHandle {
            commands,
            alive: alive.clone(),
        };
        handle.send(PeerCommand::Start(self.local_stream()));

        tokio::spawn(run_new_peer(
            Arc::downgrade(&self.inner),
            local,
            remote,
            alive,
            command_rx,
        ));
        handle
    }

    fn local_stream_slot(&self) -> std::sync::MutexGuard<'_, Option<LocalStream>> {
        self.inner
            .local_stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn subscriptions(&self) -> std::sync::MutexGuard<'_, Vec<(MessageType, HandlerId)>> {
        self.inner
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn upgrade(weak: &Weak<ServiceInner>) -> Option<WebRtcService> {
    weak.upgrade().map(|inner| WebRtcService { inner })
}

async fn run_new_peer(
    service: Weak<ServiceInner>,
    local: ClientId,
    remote: ClientId,
    alive: Arc<AtomicBool>,
    command_rx: mpsc::UnboundedReceiver<PeerCommand>,
) {
    let Some(inner) = service.upgrade() else {
        return;
    };
    let (event_tx, event_rx) = mpsc::channel(CONNECTION_EVENT_BUFFER);

    let connection = match inner.factory.create(&remote, event_tx).await {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to create connection for {}: {:?}", remote, e);
            inner
                .peers
                .remove_if(&remote, |_, handle| Arc::ptr_eq(&handle.alive, &alive));
            return;
        }
    };

    let mut peer = PerfectPeer::new(
        &local,
        remote.clone(),
        connection,
        inner.signaling.clone(),
        alive,
    );

    let streams = Arc::downgrade(&inner);
    let from = remote;
    peer.on_remote_stream(Box::new(move |stream| {
        let Some(inner) = streams.upgrade() else {
            warn!("Remote stream from {} after shutdown", from);
            return;
        };
        inner.remote_streams.notify(&RemoteStreamEvent {
            client_id: from.clone(),
            stream,
        });
    }));
    drop(inner);

    run_peer(peer, command_rx, event_rx).await;
}
