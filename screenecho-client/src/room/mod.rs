mod connection_state;
mod handler_table;
mod room_service;

pub use connection_state::*;
pub use handler_table::HandlerId;
pub use room_service::*;
