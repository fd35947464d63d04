use crate::model::client::ClientId;
use crate::model::signaling::{IceCandidateInit, SessionDescription};
use serde::{Deserialize, Serialize};

/// Server → client, once per connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdMessage {
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
}

/// Server → client, when another participant leaves the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDisconnectMessage {
    #[serde(rename = "clientID")]
    pub client_id: ClientId,
}

/// Offer or answer. Outbound, `remote_client_id` names the receiver; the
/// server rewrites it to the sender before relaying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdpMessage {
    #[serde(rename = "remoteClientID")]
    pub remote_client_id: ClientId,
    pub description: SessionDescription,
}

/// Trickled ICE candidate; addressing works like [`SdpMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidateMessage {
    #[serde(rename = "remoteClientID")]
    pub remote_client_id: ClientId,
    pub candidate: IceCandidateInit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStartedMessage {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Quality")]
    pub quality: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStoppedMessage {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub error_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}
