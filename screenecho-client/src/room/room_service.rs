use crate::config::ClientConfig;
use crate::error::RoomError;
use crate::room::handler_table::{ErasedHandler, HandlerTable};
use crate::room::{CloseOutcome, ConnectionState, HandlerId};
use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use futures::future::join_all;
use futures::{FutureExt, SinkExt, StreamExt};
use screenecho_core::{
    ClientId, ClientIdMessage, Envelope, ErrorMessage, IceCandidateInit, IceCandidateMessage,
    Message, MessageType, RoomId, SdpMessage, SessionDescription,
};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

struct ActiveConnection {
    generation: u64,
    outbound: mpsc::UnboundedSender<WsMessage>,
    task: JoinHandle<()>,
}

struct RoomInner {
    config: ClientConfig,
    handlers: Mutex<HandlerTable>,
    connection: Mutex<Option<ActiveConnection>>,
    bootstrap_handler: Mutex<Option<HandlerId>>,
    error_handler: OnceLock<HandlerId>,
    state_tx: watch::Sender<ConnectionState>,
    client_id_tx: watch::Sender<Option<ClientId>>,
    generation: AtomicU64,
}

impl RoomInner {
    fn handlers(&self) -> MutexGuard<'_, HandlerTable> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn connection(&self) -> MutexGuard<'_, Option<ActiveConnection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bootstrap_handler(&self) -> MutexGuard<'_, Option<HandlerId>> {
        self.bootstrap_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// The message bus of one room membership.
///
/// Owns at most one WebSocket to the room server, dispatches inbound
/// envelopes to handlers registered per message type and serializes
/// outbound ones. Clones share the same connection and handlers.
#[derive(Clone)]
pub struct RoomService {
    inner: Arc<RoomInner>,
}

impl Default for RoomService {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

impl RoomService {
    pub fn new(config: ClientConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        let (client_id_tx, _) = watch::channel(None);

        Self {
            inner: Arc::new(RoomInner {
                config,
                handlers: Mutex::new(HandlerTable::default()),
                connection: Mutex::new(None),
                bootstrap_handler: Mutex::new(None),
                error_handler: OnceLock::new(),
                state_tx,
                client_id_tx,
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Starts connecting to the room and returns immediately; the state is
    /// `Connecting` until the socket task reports otherwise.
    pub fn connect(&self, room_id: &RoomId) -> Result<(), RoomError> {
        let mut slot = self.inner.connection();
        if slot.is_some() {
            return Err(RoomError::AlreadyConnected);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner.state_tx.send_replace(ConnectionState::Connecting);
        self.inner.client_id_tx.send_replace(None);
        self.install_bootstrap_handlers();

        let url = self.inner.config.room_url(room_id);
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(self.clone(), url, outbound_rx, generation));

        *slot = Some(ActiveConnection {
            generation,
            outbound,
            task,
        });
        Ok(())
    }

    pub fn close(&self) -> CloseOutcome {
        let slot = self.inner.connection();
        let Some(connection) = slot.as_ref() else {
            return CloseOutcome::AlreadyClosed;
        };

        match self.state() {
            ConnectionState::Connecting => CloseOutcome::NotYetCloseable,
            ConnectionState::Open => {
                if connection.outbound.send(WsMessage::Close(None)).is_err() {
                    debug!("Socket task already gone while closing");
                }
                self.inner.state_tx.send_replace(ConnectionState::Closing);
                info!("Closing room connection");
                CloseOutcome::Closed
            }
            ConnectionState::Closing | ConnectionState::Closed => CloseOutcome::AlreadyClosed,
        }
    }

    /// Stops the socket task without a close handshake.
    pub fn abort(&self) {
        if let Some(connection) = self.inner.connection().take() {
            connection.task.abort();
            self.inner.state_tx.send_replace(ConnectionState::Closed);
            info!("Room connection aborted");
        }
    }

    /// # Panics
    ///
    /// Panics unless the connection is open.
    pub fn send<M: Message>(&self, message: M) {
        self.send_envelope(message.into_envelope());
    }

    /// # Panics
    ///
    /// Panics unless the connection is open.
    pub fn send_envelope(&self, envelope: Envelope) {
        let state = self.state();
        assert!(
            state == ConnectionState::Open,
            "cannot send '{}' while the room connection is {:?}",
            envelope.message_type(),
            state
        );
        self.enqueue(envelope);
    }

    fn send_if_open(&self, envelope: Envelope) {
        if self.state() != ConnectionState::Open {
            warn!(
                "Dropping outbound '{}', room connection is {:?}",
                envelope.message_type(),
                self.state()
            );
            return;
        }
        self.enqueue(envelope);
    }

    fn enqueue(&self, envelope: Envelope) {
        let text = match envelope.to_json() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to serialize '{}': {}", envelope.message_type(), e);
                return;
            }
        };

        let slot = self.inner.connection();
        match slot.as_ref() {
            Some(connection) => {
                if connection.outbound.send(WsMessage::Text(text.into())).is_err() {
                    warn!("Socket task gone, dropping '{}'", envelope.message_type());
                }
            }
            None => warn!("No room connection, dropping '{}'", envelope.message_type()),
        }
    }

    /// Registers `handler` for every inbound envelope carrying `M`.
    /// Registering the same function twice yields two independent registrations.
    pub fn subscribe<M, F, Fut>(&self, handler: F) -> HandlerId
    where
        M: Message,
        F: Fn(M) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let erased: ErasedHandler = Arc::new(move |envelope: &Envelope| {
            M::from_envelope(envelope).map(|msg| handler(msg.clone()).boxed())
        });
        self.inner.handlers().insert(M::TYPE, erased)
    }

    /// # Panics
    ///
    /// Panics if `id` is not registered for `kind`.
    pub fn unsubscribe(&self, kind: MessageType, id: HandlerId) {
        let removed = self.inner.handlers().remove(kind, id);
        assert!(removed, "handler {id:?} is not registered for '{kind}'");
    }

    pub fn handler_count(&self, kind: MessageType) -> usize {
        self.inner.handlers().count(kind)
    }

    /// Dispatches one inbound text frame to every handler of its type and
    /// waits for all of them. Unparseable frames are dropped.
    pub async fn handle_frame(&self, text: &str) {
        let envelope = match Envelope::parse(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Dropping inbound frame: {}", e);
                return;
            }
        };

        let kind = envelope.message_type();
        let handlers = self.inner.handlers().snapshot(kind);
        if handlers.is_empty() {
            debug!("No handler for '{}'", kind);
            return;
        }

        let pending = handlers.into_iter().filter_map(|(id, handler)| {
            match std::panic::catch_unwind(AssertUnwindSafe(|| handler(&envelope))) {
                Ok(Some(fut)) => Some(async move { (id, AssertUnwindSafe(fut).catch_unwind().await) }),
                Ok(None) => None,
                Err(_) => {
                    error!("Handler {:?} for '{}' panicked", id, kind);
                    None
                }
            }
        });

        for (id, result) in join_all(pending).await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Handler {:?} for '{}' failed: {:?}", id, kind, e),
                Err(_) => error!("Handler {:?} for '{}' panicked", id, kind),
            }
        }
    }

    pub fn try_local_client_id(&self) -> Option<ClientId> {
        self.inner.client_id_tx.borrow().clone()
    }

    /// # Panics
    ///
    /// Panics before the server has assigned an id.
    pub fn local_client_id(&self) -> ClientId {
        match self.try_local_client_id() {
            Some(id) => id,
            None => panic!("local client id requested before the room assigned one"),
        }
    }

    pub async fn wait_until_open(&self) -> Result<(), RoomError> {
        let mut rx = self.inner.state_tx.subscribe();
        let state = *rx
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
            .map_err(|_| RoomError::ConnectionClosed)?;

        match state {
            ConnectionState::Open => Ok(()),
            _ => Err(RoomError::ConnectionClosed),
        }
    }

    pub async fn wait_for_local_client_id(&self) -> Result<ClientId, RoomError> {
        let mut id_rx = self.inner.client_id_tx.subscribe();
        let mut state_rx = self.inner.state_tx.subscribe();

        loop {
            if let Some(id) = id_rx.borrow_and_update().clone() {
                return Ok(id);
            }
            if matches!(
                *state_rx.borrow_and_update(),
                ConnectionState::Closing | ConnectionState::Closed
            ) {
                return Err(RoomError::ConnectionClosed);
            }

            tokio::select! {
                changed = id_rx.changed() => changed.map_err(|_| RoomError::ConnectionClosed)?,
                changed = state_rx.changed() => changed.map_err(|_| RoomError::ConnectionClosed)?,
            }
        }
    }

    pub async fn closed(&self) {
        let mut rx = self.inner.state_tx.subscribe();
        let _ = rx.wait_for(|state| *state == ConnectionState::Closed).await;
    }

    fn install_bootstrap_handlers(&self) {
        if let Some(stale) = self.inner.bootstrap_handler().take() {
            self.inner.handlers().remove(MessageType::ClientId, stale);
        }

        let weak: Weak<RoomInner> = Arc::downgrade(&self.inner);
        let id = self.subscribe(move |msg: ClientIdMessage| {
            if let Some(inner) = weak.upgrade() {
                info!("Room assigned client id {}", msg.client_id);
                inner.client_id_tx.send_replace(Some(msg.client_id));
                if let Some(own) = inner.bootstrap_handler().take() {
                    inner.handlers().remove(MessageType::ClientId, own);
                }
            }
            async { Ok(()) }
        });
        *self.inner.bootstrap_handler() = Some(id);

        self.inner.error_handler.get_or_init(|| {
            self.subscribe(|msg: ErrorMessage| async move {
                match (msg.expected, msg.actual) {
                    (Some(expected), Some(actual)) => warn!(
                        "Room server rejected a message: {} (expected {}, got {})",
                        msg.error_message, expected, actual
                    ),
                    _ => warn!("Room server rejected a message: {}", msg.error_message),
                }
                Ok(())
            })
        });
    }

    fn finish(&self, generation: u64) {
        let mut slot = self.inner.connection();
        if slot
            .as_ref()
            .is_some_and(|connection| connection.generation == generation)
        {
            slot.take();
            self.inner.state_tx.send_replace(ConnectionState::Closed);
        }
    }

    fn mark_open(&self, generation: u64) -> bool {
        let slot = self.inner.connection();
        let current = slot
            .as_ref()
            .is_some_and(|connection| connection.generation == generation);
        if current {
            self.inner.state_tx.send_replace(ConnectionState::Open);
        }
        current
    }
}

async fn run_connection(
    service: RoomService,
    url: String,
    mut outbound_rx: mpsc::UnboundedReceiver<WsMessage>,
    generation: u64,
) {
    info!("Connecting to {}", url);

    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", url, RoomError::from(e));
            service.finish(generation);
            return;
        }
    };

    if !service.mark_open(generation) {
        return;
    }
    info!("Room connection open");

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            out = outbound_rx.recv() => {
                match out {
                    Some(msg) => {
                        if let Err(e) = ws_write.send(msg).await {
                            warn!("Failed to write to room socket: {}", e);
                            break;
                        }
                    }
                    None => break,
                }
            }

            frame = ws_read.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => service.handle_frame(text.as_str()).await,
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("Room socket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    service.finish(generation);
    info!("Room connection closed");
}

#[async_trait]
impl SignalingOutput for RoomService {
    async fn send_sdp(&self, remote: ClientId, description: SessionDescription) {
        self.send_if_open(
            SdpMessage {
                remote_client_id: remote,
                description,
            }
            .into_envelope(),
        );
    }

    async fn send_ice_candidate(&self, remote: ClientId, candidate: IceCandidateInit) {
        self.send_if_open(
            IceCandidateMessage {
                remote_client_id: remote,
                candidate,
            }
            .into_envelope(),
        );
    }

    fn local_client_id(&self) -> ClientId {
        RoomService::local_client_id(self)
    }
}
