pub use screenecho_core::model::{ClientId, RoomId};
pub use screenecho_core::{Envelope, Message, MessageType, Observable, ObserverId};

pub mod model {
    pub use screenecho_core::model::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use screenecho_client::*;
}
