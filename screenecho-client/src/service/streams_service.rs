use crate::room::{HandlerId, RoomService};
use screenecho_core::{
    MessageType, Observable, ObserverId, StreamStartedMessage, StreamStoppedMessage,
};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamAnnouncement {
    Started { name: String, quality: String },
    Stopped,
}

/// Stream announcements over the room bus.
pub struct StreamsService {
    room: RoomService,
    announcements: Arc<Observable<StreamAnnouncement>>,
    subscriptions: Mutex<Vec<(MessageType, HandlerId)>>,
}

impl StreamsService {
    pub fn new(room: &RoomService) -> Self {
        let announcements = Arc::new(Observable::new());

        let started_observers = announcements.clone();
        let started = room.subscribe(move |msg: StreamStartedMessage| {
            info!("Stream '{}' started ({})", msg.name, msg.quality);
            started_observers.notify(&StreamAnnouncement::Started {
                name: msg.name,
                quality: msg.quality,
            });
            async { Ok(()) }
        });

        let stopped_observers = announcements.clone();
        let stopped = room.subscribe(move |_: StreamStoppedMessage| {
            info!("A participant stopped streaming");
            stopped_observers.notify(&StreamAnnouncement::Stopped);
            async { Ok(()) }
        });

        Self {
            room: room.clone(),
            announcements,
            subscriptions: Mutex::new(vec![
                (MessageType::StreamStarted, started),
                (MessageType::StreamStopped, stopped),
            ]),
        }
    }

    /// # Panics
    ///
    /// Panics unless the room connection is open.
    pub fn announce_started(&self, name: impl Into<String>, quality: impl Into<String>) {
        self.room.send(StreamStartedMessage {
            name: name.into(),
            quality: quality.into(),
        });
    }

    /// # Panics
    ///
    /// Panics unless the room connection is open.
    pub fn announce_stopped(&self) {
        self.room.send(StreamStoppedMessage {});
    }

    pub fn subscribe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&StreamAnnouncement) + Send + Sync + 'static,
    {
        self.announcements.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) {
        self.announcements.unsubscribe(id);
    }

    pub fn shutdown(&self) {
        let mut subscriptions = self
            .subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (kind, id) in subscriptions.drain(..) {
            self.room.unsubscribe(kind, id);
        }
    }
}
