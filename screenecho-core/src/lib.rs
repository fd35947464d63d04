pub mod envelope;
pub mod model;
pub mod observable;
pub mod traits;

pub use envelope::{Envelope, EnvelopeError, MessageType, RawEnvelope};
pub use model::*;
pub use observable::{Observable, Observer, ObserverId};
pub use traits::Message;
