mod emitter;
mod events;
mod protocol;
mod wire;

pub use emitter::*;
pub use events::*;
pub use protocol::*;
pub use wire::*;
