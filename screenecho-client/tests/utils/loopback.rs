use async_trait::async_trait;
use screenecho_client::{SignalingOutput, WebRtcService};
use screenecho_core::{ClientId, Envelope, IceCandidateInit, IceCandidateMessage, SdpMessage, SessionDescription};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One relayed envelope: who sent it, who receives it, and the envelope as
/// the receiver sees it (remote id rewritten to the sender).
#[derive(Debug, Clone)]
pub struct Relayed {
    pub from: ClientId,
    pub to: ClientId,
    pub envelope: Envelope,
}

impl Relayed {
    pub fn description(&self) -> Option<&SessionDescription> {
        match &self.envelope {
            Envelope::Sdp(msg) => Some(&msg.description),
            _ => None,
        }
    }
}

#[derive(Default)]
struct NetworkState {
    members: HashMap<ClientId, WebRtcService>,
    log: Vec<Relayed>,
    held: Option<Vec<Relayed>>,
}

/// In-memory stand-in for the room server: relays signaling between
/// detached `WebRtcService`s the way the server does.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signaling(&self, local: &str) -> Arc<LoopbackSignaling> {
        Arc::new(LoopbackSignaling {
            local: ClientId::from(local),
            network: self.clone(),
        })
    }

    pub fn join(&self, id: &str, service: WebRtcService) {
        self.state
            .lock()
            .unwrap()
            .members
            .insert(ClientId::from(id), service);
    }

    /// Queue relayed envelopes instead of delivering them.
    pub fn hold(&self) {
        self.state.lock().unwrap().held.get_or_insert_with(Vec::new);
    }

    /// Deliver everything queued since `hold`, in order, and stop holding.
    pub fn release(&self) {
        let queued = self.state.lock().unwrap().held.take().unwrap_or_default();
        for relayed in queued {
            self.deliver(relayed);
        }
    }

    pub fn log(&self) -> Vec<Relayed> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn descriptions(&self, from: &str, to: &str) -> Vec<SessionDescription> {
        self.log()
            .iter()
            .filter(|r| r.from.as_str() == from && r.to.as_str() == to)
            .filter_map(|r| r.description().cloned())
            .collect()
    }

    fn relay(&self, relayed: Relayed) {
        let deliver_now = {
            let mut state = self.state.lock().unwrap();
            state.log.push(relayed.clone());
            match state.held.as_mut() {
                Some(queue) => {
                    queue.push(relayed.clone());
                    false
                }
                None => true,
            }
        };
        if deliver_now {
            self.deliver(relayed);
        }
    }

    fn deliver(&self, relayed: Relayed) {
        let Some(target) = self.state.lock().unwrap().members.get(&relayed.to).cloned() else {
            return;
        };
        match relayed.envelope {
            Envelope::Sdp(msg) => target.handle_sdp_message(msg),
            Envelope::IceCandidate(msg) => target.handle_ice_candidate_message(msg),
            _ => {}
        }
    }
}

pub struct LoopbackSignaling {
    local: ClientId,
    network: LoopbackNetwork,
}

#[async_trait]
impl SignalingOutput for LoopbackSignaling {
    async fn send_sdp(&self, remote: ClientId, description: SessionDescription) {
        self.network.relay(Relayed {
            from: self.local.clone(),
            to: remote,
            envelope: Envelope::Sdp(SdpMessage {
                remote_client_id: self.local.clone(),
                description,
            }),
        });
    }

    async fn send_ice_candidate(&self, remote: ClientId, candidate: IceCandidateInit) {
        self.network.relay(Relayed {
            from: self.local.clone(),
            to: remote,
            envelope: Envelope::IceCandidate(IceCandidateMessage {
                remote_client_id: self.local.clone(),
                candidate,
            }),
        });
    }

    fn local_client_id(&self) -> ClientId {
        self.local.clone()
    }
}
