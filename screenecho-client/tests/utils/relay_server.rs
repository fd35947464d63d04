use anyhow::Result;
use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use screenecho_core::{
    ClientDisconnectMessage, ClientId, ClientIdMessage, ErrorMessage, Message as _, RawEnvelope,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

struct Member {
    room: String,
    tx: mpsc::UnboundedSender<Message>,
}

#[derive(Clone, Default)]
struct RelayState {
    members: Arc<DashMap<ClientId, Member>>,
}

impl RelayState {
    fn send_to(&self, client_id: &ClientId, text: String) {
        if let Some(member) = self.members.get(client_id) {
            let _ = member.tx.send(Message::Text(text.into()));
        }
    }

    fn broadcast(&self, room: &str, except: &ClientId, text: &str) {
        for member in self.members.iter() {
            if member.room == room && member.key() != except {
                let _ = member.tx.send(Message::Text(text.to_owned().into()));
            }
        }
    }
}

/// Minimal room server for tests: assigns client ids, relays signaling to
/// the addressed client with the remote id rewritten to the sender, and
/// broadcasts stream announcements and departures.
pub struct RelayServer {
    addr: SocketAddr,
    state: RelayState,
}

impl RelayServer {
    pub async fn start() -> Result<Self> {
        let state = RelayState::default();
        let app = Router::new()
            .route("/room/{room_id}/connect", get(ws_handler))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                warn!("[RelayServer] stopped: {:?}", e);
            }
        });

        Ok(Self { addr, state })
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn member_count(&self) -> usize {
        self.state.members.len()
    }

    /// Push a raw text frame to one client.
    pub fn send_raw(&self, client_id: &ClientId, text: &str) {
        self.state.send_to(client_id, text.to_owned());
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, room_id, state))
}

async fn handle_socket(socket: WebSocket, room: String, state: RelayState) {
    let client_id = ClientId::from(Uuid::new_v4().to_string());
    info!("[RelayServer] {} joined room {}", client_id, room);

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.members.insert(
        client_id.clone(),
        Member {
            room: room.clone(),
            tx,
        },
    );

    let assigned = ClientIdMessage {
        client_id: client_id.clone(),
    };
    if let Ok(text) = assigned.into_envelope().to_json() {
        state.send_to(&client_id, text);
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let state = state.clone();
        let room = room.clone();
        let client_id = client_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => relay(&state, &room, &client_id, text.as_str()),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    state.members.remove(&client_id);
    let departed = ClientDisconnectMessage {
        client_id: client_id.clone(),
    };
    if let Ok(text) = departed.into_envelope().to_json() {
        state.broadcast(&room, &client_id, &text);
    }
    info!("[RelayServer] {} left room {}", client_id, room);
}

fn relay(state: &RelayState, room: &str, sender: &ClientId, text: &str) {
    let Ok(mut raw) = serde_json::from_str::<RawEnvelope>(text) else {
        reject(state, sender, "invalid envelope", None);
        return;
    };

    match raw.kind.as_str() {
        "sdp-message" | "new-ice-candidate" => {
            let Some(target) = raw.msg["remoteClientID"].as_str().map(ClientId::from) else {
                reject(state, sender, "missing remoteClientID", Some(raw.kind));
                return;
            };
            raw.msg["remoteClientID"] = serde_json::Value::String(sender.to_string());
            if let Ok(text) = serde_json::to_string(&raw) {
                state.send_to(&target, text);
            }
        }
        "stream-started" | "stream-stopped" => state.broadcast(room, sender, text),
        _ => reject(state, sender, "unknown message type", Some(raw.kind)),
    }
}

fn reject(state: &RelayState, client_id: &ClientId, reason: &str, actual: Option<String>) {
    let error = ErrorMessage {
        error_message: reason.to_owned(),
        expected: None,
        actual,
    };
    if let Ok(text) = error.into_envelope().to_json() {
        state.send_to(client_id, text);
    }
}
