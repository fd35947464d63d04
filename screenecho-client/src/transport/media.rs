use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

/// The local capture: an id plus the tracks every peer sends.
#[derive(Clone)]
pub struct LocalStream {
    id: String,
    tracks: Vec<LocalTrack>,
}

impl LocalStream {
    pub fn new(id: impl Into<String>, tracks: Vec<LocalTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }
}

impl fmt::Debug for LocalStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStream")
            .field("id", &self.id)
            .field(
                "tracks",
                &self.tracks.iter().map(|t| t.id().to_owned()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Media received from one remote peer. Clones share the same track list,
/// which grows as tracks of the stream arrive.
#[derive(Clone)]
pub struct RemoteStream {
    id: String,
    tracks: Arc<Mutex<Vec<Arc<TrackRemote>>>>,
}

impl RemoteStream {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tracks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add_track(&self, track: Arc<TrackRemote>) {
        self.tracks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(track);
    }

    pub fn tracks(&self) -> Vec<Arc<TrackRemote>> {
        self.tracks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// True when both handles refer to the same stream object.
    pub fn same_stream(&self, other: &RemoteStream) -> bool {
        Arc::ptr_eq(&self.tracks, &other.tracks)
    }
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("id", &self.id)
            .field("tracks", &self.tracks().len())
            .finish()
    }
}
