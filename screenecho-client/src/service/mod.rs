mod streams_service;
mod webrtc_service;

pub use streams_service::*;
pub use webrtc_service::*;
