use serde::{Deserialize, Serialize};

pub const UNKNOWN_CODEC: &str = "unknown";

/// One entry of a connection statistics report, reduced to what stream
/// statistics are derived from.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsEntry {
    Codec {
        mime_type: String,
    },
    InboundRtp {
        kind: String,
        frame_width: Option<u32>,
        frame_height: Option<u32>,
        frames_per_second: Option<f64>,
        jitter: Option<f64>,
    },
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStats {
    pub codec: String,
    pub frame_width: Option<u32>,
    pub frame_height: Option<u32>,
    pub frames_per_second: Option<f64>,
    pub jitter: Option<f64>,
}

impl StreamStats {
    /// Report used when the connection could not be queried.
    pub fn unavailable() -> Self {
        Self {
            codec: UNKNOWN_CODEC.to_owned(),
            frame_width: None,
            frame_height: None,
            frames_per_second: None,
            jitter: None,
        }
    }

    /// Codec from the first video codec entry (any codec if there is no video
    /// one), frame metrics from the inbound video entry.
    pub fn from_entries(entries: &[StatsEntry]) -> Self {
        let mut stats = Self::unavailable();

        let codecs: Vec<&str> = entries
            .iter()
            .filter_map(|entry| match entry {
                StatsEntry::Codec { mime_type } => Some(mime_type.as_str()),
                _ => None,
            })
            .collect();
        let codec = codecs
            .iter()
            .find(|mime| mime.starts_with("video/"))
            .or_else(|| codecs.first());
        if let Some(codec) = codec {
            stats.codec = (*codec).to_owned();
        }

        let inbound_video = entries.iter().find_map(|entry| match entry {
            StatsEntry::InboundRtp {
                kind,
                frame_width,
                frame_height,
                frames_per_second,
                jitter,
            } if kind == "video" => Some((*frame_width, *frame_height, *frames_per_second, *jitter)),
            _ => None,
        });
        if let Some((width, height, fps, jitter)) = inbound_video {
            stats.frame_width = width;
            stats.frame_height = height;
            stats.frames_per_second = fps;
            stats.jitter = jitter;
        }

        stats
    }
}
