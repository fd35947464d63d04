/// Lifecycle of the room connection. A bus without a connection reports `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Result of [`RoomService::close`](crate::room::RoomService::close).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// The socket is still opening; try again once it is open.
    NotYetCloseable,
    /// A close frame was queued.
    Closed,
    /// Nothing to close.
    AlreadyClosed,
}
