use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room connection is already active")]
    AlreadyConnected,

    #[error("room connection closed")]
    ConnectionClosed,

    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}
