use crate::model::{
    ClientDisconnectMessage, ClientIdMessage, ErrorMessage, IceCandidateMessage, SdpMessage,
    StreamStartedMessage, StreamStoppedMessage,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message type tags. The string forms are the wire contract.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum MessageType {
    ClientId,
    ClientDisconnect,
    Sdp,
    IceCandidate,
    StreamStarted,
    StreamStopped,
    Error,
}

impl MessageType {
    pub const ALL: [MessageType; 7] = [
        MessageType::ClientId,
        MessageType::ClientDisconnect,
        MessageType::Sdp,
        MessageType::IceCandidate,
        MessageType::StreamStarted,
        MessageType::StreamStopped,
        MessageType::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::ClientId => "client-id",
            MessageType::ClientDisconnect => "client-disconnect",
            MessageType::Sdp => "sdp-message",
            MessageType::IceCandidate => "new-ice-candidate",
            MessageType::StreamStarted => "stream-started",
            MessageType::StreamStopped => "stream-stopped",
            MessageType::Error => "error",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EnvelopeError::UnknownType(s.to_owned()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown message type '{0}'")]
    UnknownType(String),
}

/// The `{ "type", "msg" }` frame with the payload left untyped.
#[derive(Debug, Serialize, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub msg: serde_json::Value,
}

/// Every frame exchanged with the room server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "msg")]
pub enum Envelope {
    #[serde(rename = "client-id")]
    ClientId(ClientIdMessage),
    #[serde(rename = "client-disconnect")]
    ClientDisconnect(ClientDisconnectMessage),
    #[serde(rename = "sdp-message")]
    Sdp(SdpMessage),
    #[serde(rename = "new-ice-candidate")]
    IceCandidate(IceCandidateMessage),
    #[serde(rename = "stream-started")]
    StreamStarted(StreamStartedMessage),
    #[serde(rename = "stream-stopped")]
    StreamStopped(StreamStoppedMessage),
    #[serde(rename = "error")]
    Error(ErrorMessage),
}

impl Envelope {
    pub fn message_type(&self) -> MessageType {
        match self {
            Envelope::ClientId(_) => MessageType::ClientId,
            Envelope::ClientDisconnect(_) => MessageType::ClientDisconnect,
            Envelope::Sdp(_) => MessageType::Sdp,
            Envelope::IceCandidate(_) => MessageType::IceCandidate,
            Envelope::StreamStarted(_) => MessageType::StreamStarted,
            Envelope::StreamStopped(_) => MessageType::StreamStopped,
            Envelope::Error(_) => MessageType::Error,
        }
    }

    /// Parses one text frame, telling unknown types apart from broken JSON.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope = serde_json::from_str(text)?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawEnvelope) -> Result<Self, EnvelopeError> {
        let kind: MessageType = raw.kind.parse()?;
        let msg = raw.msg;

        let envelope = match kind {
            MessageType::ClientId => Envelope::ClientId(serde_json::from_value(msg)?),
            MessageType::ClientDisconnect => {
                Envelope::ClientDisconnect(serde_json::from_value(msg)?)
            }
            MessageType::Sdp => Envelope::Sdp(serde_json::from_value(msg)?),
            MessageType::IceCandidate => Envelope::IceCandidate(serde_json::from_value(msg)?),
            MessageType::StreamStarted => Envelope::StreamStarted(serde_json::from_value(msg)?),
            MessageType::StreamStopped => Envelope::StreamStopped(serde_json::from_value(msg)?),
            MessageType::Error => Envelope::Error(serde_json::from_value(msg)?),
        };
        Ok(envelope)
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}
