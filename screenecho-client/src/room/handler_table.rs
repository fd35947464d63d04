use futures::future::BoxFuture;
use screenecho_core::{Envelope, MessageType};
use std::collections::HashMap;
use std::sync::Arc;

/// Identifies one handler registration on a [`RoomService`](crate::room::RoomService).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct HandlerId(u64);

pub(crate) type HandlerFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Returns `None` when the envelope does not carry the handler's payload type.
pub(crate) type ErasedHandler = Arc<dyn Fn(&Envelope) -> Option<HandlerFuture> + Send + Sync>;

#[derive(Default)]
pub(crate) struct HandlerTable {
    handlers: HashMap<MessageType, Vec<(HandlerId, ErasedHandler)>>,
    next_id: u64,
}

impl HandlerTable {
    pub fn insert(&mut self, kind: MessageType, handler: ErasedHandler) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.handlers.entry(kind).or_default().push((id, handler));
        id
    }

    pub fn remove(&mut self, kind: MessageType, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(handler_id, _)| *handler_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(&kind);
        }
        removed
    }

    /// Handlers for `kind` in registration order.
    pub fn snapshot(&self, kind: MessageType) -> Vec<(HandlerId, ErasedHandler)> {
        self.handlers.get(&kind).cloned().unwrap_or_default()
    }

    pub fn count(&self, kind: MessageType) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }
}
