mod connection_event;
mod connection_wrapper;
mod media;
mod peer_connection;

pub use connection_event::*;
pub use connection_wrapper::*;
pub use media::*;
pub use peer_connection::*;
