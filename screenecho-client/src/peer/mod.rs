mod negotiation_state;
mod peer;
mod peer_command;
mod peer_task;
mod perfect_peer;

pub use negotiation_state::*;
pub use peer::*;
pub use peer_command::*;
pub use peer_task::*;
pub use perfect_peer::*;
