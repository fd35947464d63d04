use crate::envelope::{Envelope, MessageType};
use crate::model::{
    ClientDisconnectMessage, ClientIdMessage, ErrorMessage, IceCandidateMessage, SdpMessage,
    StreamStartedMessage, StreamStoppedMessage,
};
use serde::{Serialize, de::DeserializeOwned};

/// A payload type carried by exactly one [`Envelope`] variant.
pub trait Message: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TYPE: MessageType;

    fn into_envelope(self) -> Envelope;

    fn from_envelope(envelope: &Envelope) -> Option<&Self>;
}

macro_rules! impl_message {
    ($payload:ty, $variant:ident) => {
        impl Message for $payload {
            const TYPE: MessageType = MessageType::$variant;

            fn into_envelope(self) -> Envelope {
                Envelope::$variant(self)
            }

            fn from_envelope(envelope: &Envelope) -> Option<&Self> {
                match envelope {
                    Envelope::$variant(msg) => Some(msg),
                    _ => None,
                }
            }
        }
    };
}

impl_message!(ClientIdMessage, ClientId);
impl_message!(ClientDisconnectMessage, ClientDisconnect);
impl_message!(SdpMessage, Sdp);
impl_message!(IceCandidateMessage, IceCandidate);
impl_message!(StreamStartedMessage, StreamStarted);
impl_message!(StreamStoppedMessage, StreamStopped);
impl_message!(ErrorMessage, Error);
